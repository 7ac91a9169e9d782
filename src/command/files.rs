use once_cell::sync::Lazy;
use regex::Regex;

use crate::http::{FileContent, Parameters};
use crate::{Result, RuplayError};

/// 解析文件上传参数
///
/// 内容匹配 `path:<路径>`（整串匹配）时读出文件字节；
/// 其余内容按内联文本原样透传。可选的 content-type 与
/// 附加头槽位不受影响。引用的路径缺失或不可读时报
/// FileResolution 错误并向上传播。
static PATH_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^path:(.+)$").unwrap());

pub fn resolve_files(parameters: &mut Parameters) -> Result<()> {
    for spec in parameters.files.values_mut() {
        let Some(text) = spec.content.as_text() else {
            continue;
        };
        let Some(caps) = PATH_REF.captures(text) else {
            continue;
        };

        let path = caps[1].to_string();
        let bytes = std::fs::read(&path).map_err(|source| RuplayError::FileResolution {
            path: path.clone(),
            source,
        })?;
        spec.content = FileContent::Bytes(bytes);
    }
    Ok(())
}
