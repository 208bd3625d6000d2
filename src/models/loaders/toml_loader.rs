use crate::models::project::ProjectFile;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从 TOML 文件加载项目
pub async fn load_project_file(toml_file_path: &Path) -> Result<ProjectFile> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .with_context(|| format!("无法读取TOML文件: {}", toml_file_path.display()))?;

    let mut project: ProjectFile = toml::from_str(&content)
        .with_context(|| format!("无法解析TOML文件: {}", toml_file_path.display()))?;

    // 设置文件路径
    project.file_path = Some(toml_file_path.to_string_lossy().to_string());

    Ok(project)
}

/// 从文件夹中加载所有项目文件，解析失败的文件只记录警告
pub async fn load_all_project_files(folder_path: &str) -> Result<Vec<ProjectFile>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            paths.push(path);
        }
    }
    // 保证加载顺序稳定
    paths.sort();

    let mut projects = Vec::new();
    for path in paths {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_project_file(&path).await {
            Ok(project) => {
                tracing::info!("成功加载 {} 个章节", project.sections.len());
                projects.push(project);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {:#}", path.display(), e);
            }
        }
    }

    Ok(projects)
}
