use crate::director::{self, DeploymentHandle, Director};

/// Allow-list of deployment names.
#[derive(Debug, Clone, Default)]
pub struct DeploymentsFilter {
    names: Vec<String>,
}

/// Deployments chosen by a [`DeploymentsFilter`].
#[derive(Debug, Default)]
pub struct Selection {
    pub deployments: Vec<DeploymentHandle>,
    /// Allow-listed names the director could not resolve.
    pub missing: Vec<(String, director::Error)>,
}

impl DeploymentsFilter {
    /// Duplicate names are only kept once.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique = Vec::new();
        for name in super::trimmed(names) {
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        Self { names: unique }
    }

    /// Resolves the deployments to fetch.
    ///
    /// Without an allow-list every deployment of the director is selected.
    /// Otherwise each name is looked up on its own and names that fail to
    /// resolve end up in [`Selection::missing`].
    ///
    /// # Errors
    ///
    /// Returns the director error if the deployments cannot be listed.
    pub async fn select<D: Director>(&self, director: &D) -> director::Result<Selection> {
        if self.names.is_empty() {
            return Ok(Selection {
                deployments: director.deployments().await?,
                missing: Vec::new(),
            });
        }

        let mut selection = Selection::default();
        for name in &self.names {
            match director.find_deployment(name).await {
                Ok(handle) => selection.deployments.push(handle),
                Err(err) => {
                    log::error!("failed to find deployment `{name}`: {err}");
                    selection.missing.push((name.clone(), err));
                }
            }
        }
        Ok(selection)
    }
}
