//! Availability sanitizer.

use super::{Collected, Orchestrator, StageResult};
use crate::remote::{LinkQuery, RemovalRequest};

impl Orchestrator {
    /// Drop corrupted packages and every link that is not confirmed online
    ///
    /// Links are only inspected when collection saw a package with links of
    /// unknown availability. Corrupted packages are removed either way.
    pub(super) async fn sanitize(&self, collected: &mut Collected) -> StageResult<()> {
        let mut removal = RemovalRequest::packages(collected.corrupted.iter().copied());

        if collected.needs_sanitize {
            let links = self
                .remote
                .query_pending_links(LinkQuery {
                    package_uuids: collected.online.clone(),
                    availability: true,
                })
                .await?;
            removal.link_ids = links
                .iter()
                .filter(|link| !link.is_online())
                .map(|link| link.uuid)
                .collect();
        }

        if removal.is_empty() {
            return Ok(());
        }

        tracing::info!(
            links = removal.link_ids.len(),
            packages = removal.package_ids.len(),
            "Removing unavailable links"
        );
        self.remote.remove_pending_links(&removal).await?;
        collected.removed_links = removal.link_ids;
        Ok(())
    }
}
