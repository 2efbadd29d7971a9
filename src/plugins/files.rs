//! 文件插件族：files.create_file / write_file / edit_file / read_file / file_exists / create_folder / list_dir
//!
//! 路径统一展开 `~` 与环境变量。失败以状态码 1 表示并在输出中写明原因；
//! edit_file 修改前先写 `<path>.bak` 备份。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex::Regex;

use crate::actions::ParameterSet;
use crate::memory::normalize_path;
use crate::plugins::{optional_str, required_str, Plugin, PluginError, PluginOutput, PluginRegistry};

/// diff 预览最多展示的行数
const PREVIEW_LINES: usize = 20;

pub fn register(registry: &mut PluginRegistry) {
    registry.register(CreateFilePlugin);
    registry.register(WriteFilePlugin);
    registry.register(EditFilePlugin);
    registry.register(ReadFilePlugin);
    registry.register(FileExistsPlugin);
    registry.register(CreateFolderPlugin);
    registry.register(ListDirPlugin);
}

fn expand(path: &str) -> PathBuf {
    let expanded = PathBuf::from(normalize_path(path));
    if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    }
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// files.create_file(path, content="")
pub struct CreateFilePlugin;

#[async_trait]
impl Plugin for CreateFilePlugin {
    fn id(&self) -> &str {
        "files.create_file"
    }

    async fn call(&self, params: &ParameterSet, out: &mut PluginOutput) -> Result<i32, PluginError> {
        let path = expand(&required_str(params, "path")?);
        let content = optional_str(params, "content")?.unwrap_or_default();
        ensure_parent(&path)?;
        std::fs::write(&path, content)?;
        out.println(format!("Created file: {}", path.display()));
        Ok(0)
    }
}

/// files.write_file(path, content, mode="overwrite"|"append")
pub struct WriteFilePlugin;

#[async_trait]
impl Plugin for WriteFilePlugin {
    fn id(&self) -> &str {
        "files.write_file"
    }

    async fn call(&self, params: &ParameterSet, out: &mut PluginOutput) -> Result<i32, PluginError> {
        let path = expand(&required_str(params, "path")?);
        let content = required_str(params, "content")?;
        let append = optional_str(params, "mode")?.as_deref() == Some("append");
        ensure_parent(&path)?;
        if append {
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            file.write_all(content.as_bytes())?;
            out.println(format!("Appended to: {}", path.display()));
        } else {
            std::fs::write(&path, content)?;
            out.println(format!("Overwrote: {}", path.display()));
        }
        Ok(0)
    }
}

/// files.edit_file(path, new_content, start_marker?, end_marker?, keyword?)
///
/// - start_marker + end_marker：替换两标记之间的内容（保留标记）
/// - keyword：替换以该名字定义的 def/class 整块（连同装饰器），找不到时替换恰好只含 keyword 的行
/// - 都没有：整文件覆盖
pub struct EditFilePlugin;

#[async_trait]
impl Plugin for EditFilePlugin {
    fn id(&self) -> &str {
        "files.edit_file"
    }

    async fn call(&self, params: &ParameterSet, out: &mut PluginOutput) -> Result<i32, PluginError> {
        let path = expand(&required_str(params, "path")?);
        let new_content = required_str(params, "new_content")?;
        let start_marker = optional_str(params, "start_marker")?;
        let end_marker = optional_str(params, "end_marker")?;
        let keyword = optional_str(params, "keyword")?;

        if !path.exists() {
            out.println(format!("File not found: {}", path.display()));
            return Ok(1);
        }
        let before = std::fs::read_to_string(&path)?;

        let mut backup = path.clone().into_os_string();
        backup.push(".bak");
        match std::fs::copy(&path, &backup) {
            Ok(_) => out.println(format!("Backup created: {}", PathBuf::from(&backup).display())),
            Err(e) => out.println(format!("Backup failed: {}", e)),
        }

        let edited = match (start_marker, end_marker, keyword) {
            (Some(start), Some(end), _) => replace_between_markers(&before, &start, &end, &new_content),
            (_, _, Some(keyword)) => {
                replace_block(&before, &keyword, &new_content)
                    .or_else(|| replace_keyword_line(&before, &keyword, &new_content))
            }
            _ => {
                std::fs::write(&path, format!("{}\n", new_content.trim_end()))?;
                out.println(format!("Overwrote entire file: {}", path.display()));
                return Ok(0);
            }
        };

        match edited {
            Some(after) => {
                preview_change(&before, &after, out);
                std::fs::write(&path, after)?;
                out.println(format!("Edited file successfully: {}", path.display()));
                Ok(0)
            }
            None => {
                out.println(format!(
                    "No match found for keyword or markers in: {}",
                    path.display()
                ));
                Ok(1)
            }
        }
    }
}

/// 替换所有 start..end 区间，标记本身保留
fn replace_between_markers(before: &str, start: &str, end: &str, new_content: &str) -> Option<String> {
    if start.is_empty() || end.is_empty() {
        return None;
    }
    let mut result = String::with_capacity(before.len());
    let mut rest = before;
    let mut replaced = 0;
    while let Some(s) = rest.find(start) {
        let after_start = &rest[s + start.len()..];
        let Some(e) = after_start.find(end) else {
            break;
        };
        result.push_str(&rest[..s]);
        result.push_str(start);
        result.push('\n');
        result.push_str(new_content.trim_end());
        result.push('\n');
        result.push_str(end);
        rest = &after_start[e + end.len()..];
        replaced += 1;
    }
    if replaced == 0 {
        return None;
    }
    result.push_str(rest);
    Some(result)
}

fn indent_of(line: &str) -> &str {
    let trimmed = line.trim_start_matches([' ', '\t']);
    &line[..line.len() - trimmed.len()]
}

/// 替换名为 keyword 的 def/class 块：向上并入紧邻的装饰器行，向下到下一个 def/class/@ 行或文件尾
fn replace_block(before: &str, keyword: &str, new_content: &str) -> Option<String> {
    let name = keyword.trim().split('(').next().unwrap_or("").trim();
    if name.is_empty() {
        return None;
    }
    let header = Regex::new(&format!(
        r"^[ \t]*(async[ \t]+)?(def|class)[ \t]+{}\b",
        regex::escape(name)
    ))
    .ok()?;
    let boundary = Regex::new(r"^[ \t]*((async[ \t]+)?(def|class)\b|@)").ok()?;

    let lines: Vec<&str> = before.split_inclusive('\n').collect();
    let def_idx = lines.iter().position(|l| header.is_match(l))?;

    let mut start = def_idx;
    while start > 0 && lines[start - 1].trim_start().starts_with('@') {
        start -= 1;
    }
    let end = lines[def_idx + 1..]
        .iter()
        .position(|l| boundary.is_match(l))
        .map(|p| def_idx + 1 + p)
        .unwrap_or(lines.len());

    let base_indent = indent_of(lines[start]);
    let common = new_content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| indent_of(l).len())
        .min()
        .unwrap_or(0);
    let mut block = String::new();
    for line in new_content.lines() {
        if line.trim().is_empty() {
            block.push('\n');
        } else {
            block.push_str(base_indent);
            block.push_str(&line[common..]);
            block.push('\n');
        }
    }

    let mut result: String = lines[..start].concat();
    result.push_str(&block);
    result.push_str(&lines[end..].concat());
    Some(result)
}

/// 替换「整行只有 keyword」的行
fn replace_keyword_line(before: &str, keyword: &str, new_content: &str) -> Option<String> {
    let pattern = Regex::new(&format!(r"(?m)^[ \t]*{}[ \t]*$", regex::escape(keyword))).ok()?;
    if !pattern.is_match(before) {
        return None;
    }
    Some(
        pattern
            .replace_all(before, regex::NoExpand(new_content))
            .into_owned(),
    )
}

/// 打印简短的行级差异（去掉公共首尾后的删除/新增行）
fn preview_change(before: &str, after: &str, out: &mut PluginOutput) {
    let old: Vec<&str> = before.lines().collect();
    let new: Vec<&str> = after.lines().collect();
    let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let removed = &old[prefix..old.len() - suffix];
    let added = &new[prefix..new.len() - suffix];
    if removed.is_empty() && added.is_empty() {
        return;
    }
    out.println("Preview of changes:");
    let diff: Vec<String> = removed
        .iter()
        .map(|l| format!("-{}", l))
        .chain(added.iter().map(|l| format!("+{}", l)))
        .collect();
    for line in diff.iter().take(PREVIEW_LINES) {
        out.println(line);
    }
    if diff.len() > PREVIEW_LINES {
        out.println("...diff truncated...");
    }
}

/// files.read_file(path)：输出文件内容供 Planner 观察
pub struct ReadFilePlugin;

#[async_trait]
impl Plugin for ReadFilePlugin {
    fn id(&self) -> &str {
        "files.read_file"
    }

    async fn call(&self, params: &ParameterSet, out: &mut PluginOutput) -> Result<i32, PluginError> {
        let raw = required_str(params, "path")?;
        let path = expand(&raw);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                out.println(content);
                Ok(0)
            }
            Err(e) => {
                out.println(format!("Error reading {}: {}", path.display(), e));
                Ok(1)
            }
        }
    }
}

/// files.file_exists(path)：存在返回 0，否则 1
pub struct FileExistsPlugin;

#[async_trait]
impl Plugin for FileExistsPlugin {
    fn id(&self) -> &str {
        "files.file_exists"
    }

    async fn call(&self, params: &ParameterSet, out: &mut PluginOutput) -> Result<i32, PluginError> {
        let path = expand(&required_str(params, "path")?);
        if path.exists() {
            out.println(format!("Exists: {}", path.display()));
            Ok(0)
        } else {
            out.println(format!("Does not exist: {}", path.display()));
            Ok(1)
        }
    }
}

/// files.create_folder(path)
pub struct CreateFolderPlugin;

#[async_trait]
impl Plugin for CreateFolderPlugin {
    fn id(&self) -> &str {
        "files.create_folder"
    }

    async fn call(&self, params: &ParameterSet, out: &mut PluginOutput) -> Result<i32, PluginError> {
        let path = expand(&required_str(params, "path")?);
        std::fs::create_dir_all(&path)?;
        out.println(format!("Created folder: {}", path.display()));
        Ok(0)
    }
}

/// files.list_dir(path=".")：目录项按名排序，子目录带 `/` 后缀
pub struct ListDirPlugin;

#[async_trait]
impl Plugin for ListDirPlugin {
    fn id(&self) -> &str {
        "files.list_dir"
    }

    async fn call(&self, params: &ParameterSet, out: &mut PluginOutput) -> Result<i32, PluginError> {
        let raw = optional_str(params, "path")?.unwrap_or_else(|| ".".to_string());
        let path = expand(&raw);
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            let suffix = if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                "/"
            } else {
                ""
            };
            entries.push(format!("{}{}", name, suffix));
        }
        entries.sort();
        out.println(format!("{}:", path.display()));
        for e in entries {
            out.println(e);
        }
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(v: serde_json::Value) -> ParameterSet {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_edit_file_replaces_decorated_function_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.py");
        std::fs::write(
            &path,
            "@decorator\nasync def target(x):\n    return x + 1\n\ndef untouched():\n    return 0\n",
        )
        .unwrap();

        let mut out = PluginOutput::new();
        let code = EditFilePlugin
            .call(
                &params(json!({
                    "path": path.to_str().unwrap(),
                    "new_content": "async def target(y):\n    return y * 2\n",
                    "keyword": "target",
                })),
                &mut out,
            )
            .await
            .unwrap();
        assert_eq!(code, 0);

        let after = std::fs::read_to_string(&path).unwrap();
        assert!(!after.contains("decorator"));
        assert!(after.contains("    return y * 2"));
        assert!(after.contains("def untouched():"));
        assert!(dir.path().join("demo.py.bak").exists());
    }

    #[tokio::test]
    async fn test_edit_file_single_line_fallback_is_anchored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.txt");
        std::fs::write(
            &path,
            "value = \"keyword should not change inside strings\"\nkeyword\n",
        )
        .unwrap();

        let mut out = PluginOutput::new();
        let code = EditFilePlugin
            .call(
                &params(json!({
                    "path": path.to_str().unwrap(),
                    "new_content": "keyword = 42",
                    "keyword": "keyword",
                })),
                &mut out,
            )
            .await
            .unwrap();
        assert_eq!(code, 0);

        let after = std::fs::read_to_string(&path).unwrap();
        assert!(after.contains("keyword should not change inside strings"));
        assert!(after.contains("keyword = 42"));
        assert_eq!(after.lines().filter(|l| l.trim() == "keyword").count(), 0);
    }

    #[tokio::test]
    async fn test_edit_file_between_markers_keeps_markers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf.txt");
        std::fs::write(&path, "head\n# BEGIN\nold\n# END\ntail\n").unwrap();

        let mut out = PluginOutput::new();
        let code = EditFilePlugin
            .call(
                &params(json!({
                    "path": path.to_str().unwrap(),
                    "new_content": "new\n",
                    "start_marker": "# BEGIN",
                    "end_marker": "# END",
                })),
                &mut out,
            )
            .await
            .unwrap();
        assert_eq!(code, 0);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "head\n# BEGIN\nnew\n# END\ntail\n"
        );
        assert!(out.as_str().contains("+new"));
    }

    #[tokio::test]
    async fn test_edit_file_no_match_returns_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "nothing here\n").unwrap();
        let mut out = PluginOutput::new();
        let code = EditFilePlugin
            .call(
                &params(json!({
                    "path": path.to_str().unwrap(),
                    "new_content": "x",
                    "keyword": "absent",
                })),
                &mut out,
            )
            .await
            .unwrap();
        assert_eq!(code, 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "nothing here\n");
    }

    #[tokio::test]
    async fn test_edit_file_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut out = PluginOutput::new();
        let code = EditFilePlugin
            .call(
                &params(json!({
                    "path": dir.path().join("none.txt").to_str().unwrap(),
                    "new_content": "x",
                })),
                &mut out,
            )
            .await
            .unwrap();
        assert_eq!(code, 1);
        assert!(out.as_str().contains("File not found"));
    }

    #[tokio::test]
    async fn test_create_write_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/notes.txt");
        let p = path.to_str().unwrap();
        let mut out = PluginOutput::new();

        assert_eq!(
            CreateFilePlugin
                .call(&params(json!({"path": p, "content": "one\n"})), &mut out)
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            WriteFilePlugin
                .call(
                    &params(json!({"path": p, "content": "two\n", "mode": "append"})),
                    &mut out
                )
                .await
                .unwrap(),
            0
        );
        let mut read_out = PluginOutput::new();
        assert_eq!(
            ReadFilePlugin
                .call(&params(json!({"path": p})), &mut read_out)
                .await
                .unwrap(),
            0
        );
        assert_eq!(read_out.as_str().trim(), "one\ntwo");
    }

    #[tokio::test]
    async fn test_missing_path_is_plugin_error() {
        let mut out = PluginOutput::new();
        let err = CreateFolderPlugin
            .call(&params(json!({})), &mut out)
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::MissingParam(p) if p == "path"));
    }

    #[tokio::test]
    async fn test_folder_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("notes");
        let mut out = PluginOutput::new();
        assert_eq!(
            CreateFolderPlugin
                .call(&params(json!({"path": folder.to_str().unwrap()})), &mut out)
                .await
                .unwrap(),
            0
        );
        std::fs::write(dir.path().join("b.txt"), "").unwrap();

        let mut listing = PluginOutput::new();
        ListDirPlugin
            .call(
                &params(json!({"path": dir.path().to_str().unwrap()})),
                &mut listing,
            )
            .await
            .unwrap();
        let text = listing.as_str();
        assert!(text.contains("b.txt"));
        assert!(text.contains("notes/"));

        let mut exists = PluginOutput::new();
        assert_eq!(
            FileExistsPlugin
                .call(&params(json!({"path": folder.to_str().unwrap()})), &mut exists)
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            FileExistsPlugin
                .call(
                    &params(json!({"path": dir.path().join("zzz").to_str().unwrap()})),
                    &mut exists
                )
                .await
                .unwrap(),
            1
        );
    }
}
