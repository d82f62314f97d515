//! Tabbed company-profile capture.

use crate::error::Result;
use regscope_browser::{NavigationController, PanelState};
use regscope_core::{ImageArtifact, ProfileTab};
use tracing::{debug, warn};

/// Captures the content region of every profile tab.
pub struct ProfileExtractor<'a> {
    nav: &'a NavigationController,
}

impl<'a> ProfileExtractor<'a> {
    /// Extractor driving `nav`.
    #[must_use]
    pub fn new(nav: &'a NavigationController) -> Self {
        Self { nav }
    }

    /// One artifact per tab, in [`ProfileTab::ALL`] order.
    ///
    /// Always yields one artifact per tab. A tab that cannot be opened, whose
    /// content never mounts, or whose capture fails gets an empty artifact.
    pub async fn extract(&self) -> Result<Vec<ImageArtifact>> {
        let selectors = &self.nav.site().selectors;
        let mut captures = Vec::with_capacity(ProfileTab::ALL.len());

        for tab in ProfileTab::ALL {
            let state = self
                .nav
                .hover_then_activate(&selectors.tab_menu, selectors.tabs.for_tab(tab))
                .await;

            let artifact = match state {
                Ok(PanelState::Mounted) => self.capture(tab).await,
                Ok(PanelState::Missing) => {
                    warn!(%tab, "tab content missing, recording empty capture");
                    ImageArtifact::empty()
                }
                Err(e) => {
                    warn!(%tab, error = %e, "could not open tab, recording empty capture");
                    ImageArtifact::empty()
                }
            };
            captures.push(artifact);
        }

        Ok(captures)
    }

    async fn capture(&self, tab: ProfileTab) -> ImageArtifact {
        let region = &self.nav.site().selectors.content_region;

        // Same crop origin for every tab.
        if let Err(e) = self.nav.scroll_to_origin().await {
            warn!(%tab, error = %e, "could not reset scroll position");
        }

        match self.nav.capture(region).await {
            Ok(Some(bytes)) => {
                debug!(%tab, bytes = bytes.len(), "captured tab");
                ImageArtifact::from_bytes(&bytes)
            }
            Ok(None) => {
                warn!(%tab, region = %region, "content region vanished before capture");
                ImageArtifact::empty()
            }
            Err(e) => {
                warn!(%tab, error = %e, "capture failed, recording empty capture");
                ImageArtifact::empty()
            }
        }
    }
}
