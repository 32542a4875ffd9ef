//! Bulk archive loader (C8): populates the engine from a ZIP file at
//! startup. Order-sensitive — every `locations_` entry is processed before
//! any `users_` entry, which is processed before any `visits_` entry,
//! because a visit can only be created once its user and location exist.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use zip::ZipArchive;

use crate::engine::{dto, Engine};

#[derive(Deserialize)]
struct LocationsFile {
    locations: Vec<dto::LocationCreate>,
}

#[derive(Deserialize)]
struct UsersFile {
    users: Vec<dto::UserCreate>,
}

#[derive(Deserialize)]
struct VisitsFile {
    visits: Vec<dto::VisitCreate>,
}

pub fn load_archive(engine: &Engine, zip_path: &Path) -> Result<()> {
    let file = std::fs::File::open(zip_path).with_context(|| format!("opening archive {}", zip_path.display()))?;
    let mut archive = ZipArchive::new(file).context("reading zip archive")?;

    load_prefixed(&mut archive, "locations_", |bytes| {
        let parsed: LocationsFile = serde_json::from_slice(bytes)?;
        for location in parsed.locations {
            if let Err(err) = engine.create_location(location) {
                tracing::warn!(?err, "bulk load: rejected location");
            }
        }
        Ok(())
    })?;

    load_prefixed(&mut archive, "users_", |bytes| {
        let parsed: UsersFile = serde_json::from_slice(bytes)?;
        for user in parsed.users {
            if let Err(err) = engine.create_user(user) {
                tracing::warn!(?err, "bulk load: rejected user");
            }
        }
        Ok(())
    })?;

    load_prefixed(&mut archive, "visits_", |bytes| {
        let parsed: VisitsFile = serde_json::from_slice(bytes)?;
        for visit in parsed.visits {
            if let Err(err) = engine.create_visit(visit) {
                tracing::warn!(?err, "bulk load: rejected visit (missing user/location is expected at the boundary)");
            }
        }
        Ok(())
    })?;

    Ok(())
}

fn load_prefixed<R, F>(archive: &mut ZipArchive<R>, prefix: &str, mut handle: F) -> Result<()>
where
    R: std::io::Read + std::io::Seek,
    F: FnMut(&[u8]) -> Result<()>,
{
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with(prefix))
        .map(str::to_string)
        .collect();
    names.sort();

    for name in names {
        let mut entry = archive.by_name(&name).with_context(|| format!("reading entry {name}"))?;
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .with_context(|| format!("decompressing entry {name}"))?;
        handle(&bytes).with_context(|| format!("parsing entry {name}"))?;
        tracing::info!(entry = %name, "bulk load: processed entry");
    }
    Ok(())
}
