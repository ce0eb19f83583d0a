//! In-memory project aggregate store.

use stagegate_types::{Project, ProjectId, StoreError};
use std::collections::HashMap;
use std::sync::RwLock;

/// Shared store of project aggregates.
#[derive(Default)]
pub struct ProjectStore {
    projects: RwLock<HashMap<ProjectId, Project>>,
}

impl ProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, project: Project) -> Result<(), StoreError> {
        let mut guard = self
            .projects
            .write()
            .map_err(|_| StoreError::Poisoned("project store"))?;
        if guard.contains_key(&project.id) {
            return Err(StoreError::Conflict(format!(
                "project {} already exists",
                project.id
            )));
        }
        guard.insert(project.id.clone(), project);
        Ok(())
    }

    pub fn get(&self, id: &ProjectId) -> Option<Project> {
        self.projects
            .read()
            .ok()
            .and_then(|guard| guard.get(id).cloned())
    }

    /// Apply a mutation to a project under a single write guard.
    pub fn update<F>(&self, id: &ProjectId, mutate: F) -> Result<Project, StoreError>
    where
        F: FnOnce(&mut Project),
    {
        let mut guard = self
            .projects
            .write()
            .map_err(|_| StoreError::Poisoned("project store"))?;
        let project = guard
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("project {}", id)))?;
        mutate(project);
        Ok(project.clone())
    }

    pub fn len(&self) -> usize {
        self.projects.read().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_insert_conflicts() {
        let store = ProjectStore::new();
        let project = Project::new(ProjectId::new("p1"), "TCS-1", "Test", "design");
        store.insert(project.clone()).unwrap();
        assert!(matches!(
            store.insert(project),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn update_mutates_under_the_guard() {
        let store = ProjectStore::new();
        store
            .insert(Project::new(ProjectId::new("p1"), "TCS-1", "Test", "design"))
            .unwrap();

        let updated = store
            .update(&ProjectId::new("p1"), |p| {
                p.has_pending_change_order = true;
            })
            .unwrap();
        assert!(updated.has_pending_change_order);
        assert!(store.get(&ProjectId::new("p1")).unwrap().has_pending_change_order);
    }

    #[test]
    fn update_missing_project_is_not_found() {
        let store = ProjectStore::new();
        assert!(matches!(
            store.update(&ProjectId::new("nope"), |_| {}),
            Err(StoreError::NotFound(_))
        ));
    }
}
