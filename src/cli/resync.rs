//! CLI `resync` and `preview` commands.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use conductor::config::ConductorConfig;
use conductor::{deploy, synth};

/// Project name and directory from the optional arguments. The directory
/// defaults to the registered path, then the current directory; the project
/// defaults to the directory's name.
fn target(
    conn: &rusqlite::Connection,
    project: Option<&str>,
    path: Option<&Path>,
) -> Result<(String, PathBuf)> {
    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    let name = match project {
        Some(name) => name.to_string(),
        None => {
            let dir = path.unwrap_or(cwd.as_path());
            match conductor::store::projects::project_for_path(conn, &dir.to_string_lossy())? {
                Some(name) => name,
                None => dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .context("cannot infer project name; pass PROJECT")?,
            }
        }
    };

    let dir = match path {
        Some(p) => p.to_path_buf(),
        None => conductor::store::projects::get_project(conn, &name)?
            .and_then(|p| p.path)
            .map(PathBuf::from)
            .unwrap_or(cwd),
    };
    Ok((name, dir))
}

/// Resynthesize and write the artifact now.
pub fn resync(config: &ConductorConfig, project: Option<&str>, path: Option<&Path>) -> Result<()> {
    let conn = super::open_db(config)?;
    let (name, dir) = target(&conn, project, path)?;
    let deployment = deploy::resync(&conn, config, &name, &dir)?;

    println!("Project:   {}", deployment.project);
    println!("Artifact:  {}", deployment.artifact_path.display());
    println!("Outcome:   {}", deployment.outcome);
    println!("Hash:      {}", deployment.hash);
    Ok(())
}

/// Print the synthesized document without writing it.
pub fn preview(config: &ConductorConfig, project: Option<&str>, path: Option<&Path>) -> Result<()> {
    let conn = super::open_db(config)?;
    let (name, dir) = target(&conn, project, path)?;
    let artifact = config.artifact_path_for(&dir);
    let synthesized = synth::synthesize_project(&conn, &name, &artifact)?;

    print!("{}", String::from_utf8_lossy(&synthesized.bytes));
    eprintln!("sha256: {}", synthesized.hash);
    match deploy::existing_hash(&artifact) {
        Some(current) if current == synthesized.hash => eprintln!("on disk: identical"),
        Some(_) => eprintln!("on disk: differs ({})", artifact.display()),
        None => eprintln!("on disk: missing ({})", artifact.display()),
    }
    Ok(())
}
