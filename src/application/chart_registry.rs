// Chart registry - Read-mostly chart definitions with snapshot reads
use crate::domain::chart::ChartDefinition;
use crate::domain::error::ExportError;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Immutable view of the registry, held for the lifetime of one request.
pub type RegistrySnapshot = Arc<IndexMap<String, Arc<ChartDefinition>>>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Invalid(#[from] ExportError),

    #[error("registry storage {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("registry encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Writers build a new map and swap it in; readers clone the current `Arc`
/// and never observe a half-applied change.
pub struct ChartRegistry {
    current: RwLock<RegistrySnapshot>,
    writer: tokio::sync::Mutex<()>,
    storage: Option<PathBuf>,
}

impl ChartRegistry {
    pub fn new(definitions: Vec<ChartDefinition>) -> Result<Self, RegistryError> {
        let mut map = IndexMap::with_capacity(definitions.len());
        for definition in definitions {
            definition.validate()?;
            map.insert(definition.id.clone(), Arc::new(definition));
        }
        Ok(Self {
            current: RwLock::new(Arc::new(map)),
            writer: tokio::sync::Mutex::new(()),
            storage: None,
        })
    }

    /// Load persisted definitions from `path` and add any seed whose id is not
    /// already stored. A missing file starts from the seeds alone.
    pub fn load(path: impl Into<PathBuf>, seeds: Vec<ChartDefinition>) -> Result<Self, RegistryError> {
        let path = path.into();
        let mut map: IndexMap<String, ChartDefinition> = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => IndexMap::new(),
            Err(source) => return Err(RegistryError::Storage { path, source }),
        };
        for (id, definition) in &map {
            definition.validate()?;
            if id != &definition.id {
                return Err(ExportError::invalid(format!(
                    "stored chart key '{}' does not match its id '{}'",
                    id, definition.id
                ))
                .into());
            }
        }
        let stored = map.len();
        for seed in seeds {
            if !map.contains_key(&seed.id) {
                seed.validate()?;
                map.insert(seed.id.clone(), seed);
            }
        }
        tracing::info!(path = %path.display(), stored, total = map.len(), "loaded chart registry");

        let map = map.into_iter().map(|(id, d)| (id, Arc::new(d))).collect();
        Ok(Self {
            current: RwLock::new(Arc::new(map)),
            writer: tokio::sync::Mutex::new(()),
            storage: Some(path),
        })
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.current.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<Arc<ChartDefinition>> {
        self.current.read().get(id).cloned()
    }

    pub fn list(&self) -> Vec<Arc<ChartDefinition>> {
        self.snapshot().values().cloned().collect()
    }

    /// Insert or replace a definition; returns the previous one.
    pub async fn register(&self, definition: ChartDefinition) -> Result<Option<Arc<ChartDefinition>>, RegistryError> {
        definition.validate()?;
        let _guard = self.writer.lock().await;

        let mut next = (*self.snapshot()).clone();
        let previous = next.insert(definition.id.clone(), Arc::new(definition));
        self.publish(next).await?;
        Ok(previous)
    }

    pub async fn remove(&self, id: &str) -> Result<Option<Arc<ChartDefinition>>, RegistryError> {
        let _guard = self.writer.lock().await;

        let mut next = (*self.snapshot()).clone();
        let removed = next.shift_remove(id);
        if removed.is_some() {
            self.publish(next).await?;
        }
        Ok(removed)
    }

    /// Persist first, then swap, so a failed write leaves readers on the old map.
    async fn publish(&self, next: IndexMap<String, Arc<ChartDefinition>>) -> Result<(), RegistryError> {
        if let Some(path) = &self.storage {
            persist(path, &next).await?;
        }
        *self.current.write() = Arc::new(next);
        Ok(())
    }
}

async fn persist(path: &Path, map: &IndexMap<String, Arc<ChartDefinition>>) -> Result<(), RegistryError> {
    let plain: IndexMap<&str, &ChartDefinition> = map.iter().map(|(k, v)| (k.as_str(), v.as_ref())).collect();
    let bytes = serde_json::to_vec_pretty(&plain)?;

    let tmp = path.with_extension("json.tmp");
    let storage_err = |source: std::io::Error| RegistryError::Storage {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(storage_err)?;
    }
    tokio::fs::write(&tmp, &bytes).await.map_err(storage_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(storage_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chart::ChartType;

    fn definition(id: &str) -> ChartDefinition {
        let mut def = ChartDefinition::new(
            id,
            format!("Chart {}", id),
            ChartType::Pie,
            "SELECT status AS name, COUNT(*) AS value FROM dbo.Risks WHERE 1=1${dateFilter} GROUP BY status",
        );
        def.x_field = "label".to_string();
        def
    }

    #[tokio::test]
    async fn test_register_then_get_round_trips() {
        let registry = ChartRegistry::new(vec![]).unwrap();
        let def = definition("by_status");
        assert!(registry.register(def.clone()).await.unwrap().is_none());
        assert_eq!(registry.get("by_status").as_deref(), Some(&def));
    }

    #[tokio::test]
    async fn test_snapshot_is_unaffected_by_later_writes() {
        let registry = ChartRegistry::new(vec![definition("a")]).unwrap();
        let before = registry.snapshot();

        let mut replaced = definition("a");
        replaced.chart_type = ChartType::Bar;
        let previous = registry.register(replaced).await.unwrap();
        registry.register(definition("b")).await.unwrap();

        assert_eq!(previous.unwrap().chart_type, ChartType::Pie);
        assert_eq!(before.len(), 1);
        assert_eq!(before["a"].chart_type, ChartType::Pie);
        assert_eq!(registry.get("a").unwrap().chart_type, ChartType::Bar);
        assert_eq!(registry.list().len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_invalid_definition() {
        let registry = ChartRegistry::new(vec![]).unwrap();
        let mut def = definition("x");
        def.query = "  ".to_string();
        assert!(matches!(
            registry.register(def).await,
            Err(RegistryError::Invalid(ExportError::InvalidRequest(_)))
        ));
        assert!(registry.list().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("charts.json");

        let registry = ChartRegistry::load(&path, vec![definition("seeded")]).unwrap();
        let mut custom = definition("custom");
        custom.y_field = "total".to_string();
        custom.chart_type = ChartType::Scatter;
        registry.register(custom.clone()).await.unwrap();
        registry.remove("seeded").await.unwrap();

        let reloaded = ChartRegistry::load(&path, vec![]).unwrap();
        assert_eq!(reloaded.get("custom").as_deref(), Some(&custom));
        assert!(reloaded.get("seeded").is_none());
        assert!(!path.with_extension("json.tmp").exists());
    }
}
