use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::SeedSource;
use crate::engine::{Engine, EngineError};
use crate::model::*;

/// Users and caravans to load before the server accepts connections.
///
/// JSON layout matches the entity serde shape; `id` may be omitted and is then generated.
/// Resources refer to their host by `host_id`, so hosts in the same file need explicit ids.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl SeedData {
    /// One host with two caravans and one guest.
    pub fn demo() -> Self {
        let host = User::new("Host Alice", "host@example.com", UserRole::Host);
        let guest = User::new("Guest Bob", "guest@example.com", UserRole::Guest);
        let resources = vec![
            Resource::new(host.id, "Cozy Camper", "Seoul", 4, 150.0),
            Resource::new(host.id, "Luxury Land-Yacht", "Busan", 6, 250.0),
        ];
        Self {
            users: vec![host, guest],
            resources,
        }
    }

    pub fn from_json(text: &str) -> Result<Self, SeedError> {
        serde_json::from_str(text).map_err(SeedError::Json)
    }

    pub fn load(path: &Path) -> Result<Self, SeedError> {
        let text = std::fs::read_to_string(path).map_err(|e| SeedError::Io(path.to_path_buf(), e))?;
        Self::from_json(&text)
    }

    pub fn from_source(source: &SeedSource) -> Result<Self, SeedError> {
        match source {
            SeedSource::Demo => Ok(Self::demo()),
            SeedSource::File(path) => Self::load(path),
        }
    }

    /// Register every user, then every caravan. Stops at the first rejected record.
    pub fn apply(self, engine: &Engine) -> Result<(), SeedError> {
        let (users, resources) = (self.users.len(), self.resources.len());
        for user in self.users {
            engine.register_user(user).map_err(SeedError::Engine)?;
        }
        for resource in self.resources {
            engine.create_resource(resource).map_err(SeedError::Engine)?;
        }
        info!("seeded {users} users, {resources} caravans");
        Ok(())
    }
}

#[derive(Debug)]
pub enum SeedError {
    Io(PathBuf, std::io::Error),
    Json(serde_json::Error),
    Engine(EngineError),
}

impl fmt::Display for SeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedError::Io(path, e) => write!(f, "seed file {}: {e}", path.display()),
            SeedError::Json(e) => write!(f, "seed data: {e}"),
            SeedError::Engine(e) => write!(f, "seed record rejected: {e}"),
        }
    }
}

impl std::error::Error for SeedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SeedError::Io(_, e) => Some(e),
            SeedError::Json(e) => Some(e),
            SeedError::Engine(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_seeds_two_caravans_and_a_guest() {
        let engine = Engine::new();
        SeedData::demo().apply(&engine).unwrap();

        assert_eq!(engine.list_users().len(), 2);
        let mut names: Vec<String> = engine.list_resources().into_iter().map(|r| r.name).collect();
        names.sort();
        assert_eq!(names, vec!["Cozy Camper", "Luxury Land-Yacht"]);
        assert_eq!(engine.first_guest().unwrap().name, "Guest Bob");
    }

    #[test]
    fn json_seed_with_explicit_host_id() {
        let text = r#"{
            "users": [
                {"id": "01ARZ3NDEKTSV4RRFFQ69G5FAV", "name": "Host Carol", "contact": "carol@example.com", "role": "host"}
            ],
            "resources": [
                {"host_id": "01ARZ3NDEKTSV4RRFFQ69G5FAV", "name": "Teardrop", "location": "Jeju",
                 "capacity": 2, "daily_rate": 90.0, "amenities": ["heater"], "status": "maintenance"}
            ]
        }"#;
        let engine = Engine::new();
        SeedData::from_json(text).unwrap().apply(&engine).unwrap();

        let resources = engine.list_resources();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].status, AvailabilityState::Maintenance);
        assert_eq!(resources[0].amenities, vec!["heater".to_string()]);
    }

    #[test]
    fn resource_with_unknown_host_rejected() {
        let text = r#"{"resources": [
            {"host_id": "01ARZ3NDEKTSV4RRFFQ69G5FAV", "name": "Orphan", "location": "Nowhere",
             "capacity": 2, "daily_rate": 90.0}
        ]}"#;
        let engine = Engine::new();
        let err = SeedData::from_json(text).unwrap().apply(&engine).unwrap_err();
        assert!(matches!(err, SeedError::Engine(EngineError::NotFound { .. })));
    }

    #[test]
    fn malformed_json_rejected() {
        assert!(matches!(
            SeedData::from_json("{\"users\": 3}"),
            Err(SeedError::Json(_))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = SeedData::load(Path::new("/nonexistent/caravans.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/caravans.json"));
    }
}
