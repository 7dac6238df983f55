//! Reference data feed: the read-only list of houses and courts. Backed by a
//! JSON file when configured, otherwise by the built-in venue defaults. The
//! file is re-read on `refresh`, which the HTTP layer calls at the start of a
//! booking session; an unreadable feed surfaces as a retryable error and
//! leaves the last good snapshot in place.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::model::{Court, CourtId, CourtType, House, HouseId};

#[derive(Debug)]
pub enum DirectoryError {
    /// The feed could not be read or parsed — retryable.
    Unavailable(String),
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectoryError::Unavailable(e) => write!(f, "reference data unavailable: {e}"),
        }
    }
}

impl std::error::Error for DirectoryError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub courts: Vec<Court>,
    pub houses: Vec<House>,
}

impl Snapshot {
    pub fn active_court(&self, id: &CourtId) -> Option<&Court> {
        self.courts.iter().find(|c| c.active && &c.id == id)
    }

    pub fn active_house(&self, id: &HouseId) -> Option<&House> {
        self.houses.iter().find(|h| h.active && &h.id == id)
    }

    pub fn court_name(&self, id: &CourtId) -> String {
        self.courts
            .iter()
            .find(|c| &c.id == id)
            .map_or_else(|| id.to_string(), |c| c.name.clone())
    }

    pub fn house_name(&self, id: &HouseId) -> String {
        self.houses
            .iter()
            .find(|h| &h.id == id)
            .map_or_else(|| id.to_string(), |h| h.name.clone())
    }
}

pub struct Directory {
    source: Option<PathBuf>,
    current: RwLock<Snapshot>,
}

impl Directory {
    /// Built-in venue defaults, no file backing.
    pub fn builtin() -> Self {
        Self {
            source: None,
            current: RwLock::new(builtin_snapshot()),
        }
    }

    /// Load from a JSON file; the initial read must succeed.
    pub fn from_file(path: &Path) -> Result<Self, DirectoryError> {
        let snapshot = read_snapshot(path)?;
        Ok(Self {
            source: Some(path.to_path_buf()),
            current: RwLock::new(snapshot),
        })
    }

    /// Re-read the backing file, if any. On failure the previous snapshot
    /// stays current and the error is returned to the caller to surface.
    pub fn refresh(&self) -> Result<(), DirectoryError> {
        let Some(path) = &self.source else {
            return Ok(());
        };
        let snapshot = read_snapshot(path)?;
        let mut current = self
            .current
            .write()
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".into()))?;
        *current = snapshot;
        Ok(())
    }

    pub fn snapshot(&self) -> Result<Snapshot, DirectoryError> {
        self.current
            .read()
            .map(|s| s.clone())
            .map_err(|_| DirectoryError::Unavailable("directory lock poisoned".into()))
    }
}

fn read_snapshot(path: &Path) -> Result<Snapshot, DirectoryError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| DirectoryError::Unavailable(format!("{}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| DirectoryError::Unavailable(format!("{}: {e}", path.display())))
}

fn builtin_snapshot() -> Snapshot {
    let courts = vec![
        Court {
            id: CourtId("padel".into()),
            name: "Padel Court".into(),
            court_type: CourtType::Padel,
            active: true,
        },
        Court {
            id: CourtId("tennis".into()),
            name: "Tennis/Pickleball".into(),
            court_type: CourtType::TennisPickleball,
            active: true,
        },
    ];
    let houses = [
        ("casa-cereza", "Casa Cereza"),
        ("casa-coco", "Casa Coco"),
        ("casa-cova", "Casa Cova"),
        ("casa-del-mar", "Casa del Mar"),
        ("casa-hamui", "Casa Hamui"),
        ("casa-hola-ola", "Casa Hola Ola"),
        ("casa-marvilla", "Casa Marvilla"),
        ("casa-naila-del-mar", "Casa Naila del Mar"),
        ("casa-navari", "Casa Navari"),
        ("casa-numana", "Casa NumaNa"),
        ("casa-rhino", "Casa Rhino"),
        ("casa-siano", "Casa Siano"),
        ("casa-staa", "Casa Staa"),
    ]
    .into_iter()
    .map(|(id, name)| House {
        id: HouseId(id.into()),
        name: name.into(),
        active: true,
    })
    .collect();
    Snapshot { courts, houses }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("courtbook_test_directory");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn builtin_has_both_courts() {
        let dir = Directory::builtin();
        let snap = dir.snapshot().unwrap();
        assert_eq!(snap.courts.len(), 2);
        assert!(snap.active_court(&CourtId("padel".into())).is_some());
        assert!(snap.active_court(&CourtId("tennis".into())).is_some());
        assert_eq!(snap.houses.len(), 13);
    }

    #[test]
    fn inactive_entries_are_not_resolved() {
        let mut snap = builtin_snapshot();
        snap.houses[0].active = false;
        let id = snap.houses[0].id.clone();
        assert!(snap.active_house(&id).is_none());
        // Display name still resolves for historical rows.
        assert_eq!(snap.house_name(&id), "Casa Cereza");
    }

    #[test]
    fn from_file_round_trip() {
        let path = tmp_path("feed.json");
        let snap = builtin_snapshot();
        std::fs::write(&path, serde_json::to_string(&snap).unwrap()).unwrap();

        let dir = Directory::from_file(&path).unwrap();
        assert_eq!(dir.snapshot().unwrap().houses.len(), 13);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let path = tmp_path("missing.json");
        let _ = std::fs::remove_file(&path);
        assert!(Directory::from_file(&path).is_err());
    }

    #[test]
    fn refresh_keeps_last_good_snapshot_on_failure() {
        let path = tmp_path("refresh.json");
        let snap = builtin_snapshot();
        std::fs::write(&path, serde_json::to_string(&snap).unwrap()).unwrap();

        let dir = Directory::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(dir.refresh().is_err());
        assert_eq!(dir.snapshot().unwrap().houses.len(), 13);
    }
}
