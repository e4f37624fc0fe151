//! The form flow around the core: edit a draft, submit it, export the
//! banner, then share it.

use url::Url;

use crate::capture::{RenderTree, BANNER_TARGET_ID};
use crate::catalog::TechCatalog;
use crate::error::BannerError;
use crate::export::{ExportedImage, SnapshotExporter};
use crate::layout::{resolve_layout, RenderedBanner};
use crate::profile::{BannerProfile, StackSelection};
use crate::share::{build_share_url, ShareContentMode, ShareTarget, SiteMetadata};
use crate::theme::LayoutChoice;

pub struct BannerSession {
    catalog: TechCatalog,
    profile: BannerProfile,
    stack: StackSelection,
    choice: LayoutChoice,
    tree: RenderTree,
    exporter: SnapshotExporter,
    site: SiteMetadata,
    share_mode: ShareContentMode,
    submitted: bool,
}

impl BannerSession {
    pub fn new(
        catalog: TechCatalog,
        exporter: SnapshotExporter,
        site: SiteMetadata,
        share_mode: ShareContentMode,
    ) -> Self {
        Self {
            catalog,
            profile: BannerProfile::default(),
            stack: StackSelection::new(),
            choice: LayoutChoice::default(),
            tree: RenderTree::new(),
            exporter,
            site,
            share_mode,
            submitted: false,
        }
    }

    pub fn profile(&self) -> &BannerProfile {
        &self.profile
    }

    pub fn stack(&self) -> &StackSelection {
        &self.stack
    }

    pub fn choice(&self) -> LayoutChoice {
        self.choice
    }

    pub fn set_profile(&mut self, profile: BannerProfile) {
        self.profile = profile;
        self.refresh();
    }

    pub fn set_stack(&mut self, stack: StackSelection) {
        self.stack = stack;
        self.refresh();
    }

    /// Adds or removes one technology. Returns whether it is now selected.
    pub fn toggle_tech(&mut self, id: &str) -> bool {
        let selected = self.stack.toggle(id);
        self.refresh();
        selected
    }

    pub fn set_choice(&mut self, choice: LayoutChoice) {
        self.choice = choice;
        self.refresh();
    }

    /// What the live preview shows for the current draft.
    pub fn preview(&self) -> RenderedBanner {
        resolve_layout(&self.profile, &self.stack, &self.catalog, self.choice)
    }

    /// Validates the draft and mounts the full-fidelity banner for export.
    /// A rejected submit withdraws any earlier one.
    pub fn submit(&mut self) -> Result<&RenderedBanner, BannerError> {
        if let Err(error) = self.profile.validate() {
            self.submitted = false;
            self.tree.unmount(BANNER_TARGET_ID);
            log::warn!("submit rejected: {error}");
            return Err(error);
        }
        self.mount_banner();
        self.tree
            .banner(BANNER_TARGET_ID)
            .ok_or_else(|| BannerError::CaptureTargetMissing {
                id: BANNER_TARGET_ID.to_owned(),
            })
    }

    /// Submitted, still valid after later edits, and not mid-export.
    pub fn export_enabled(&self) -> bool {
        self.submitted && self.profile.validate().is_ok() && self.exporter.trigger_enabled()
    }

    /// Exports the current draft. The draft is validated on every call; a
    /// valid draft that was never submitted is mounted first.
    pub fn export(&mut self) -> Result<&ExportedImage, BannerError> {
        if let Err(error) = self.profile.validate() {
            log::warn!("export blocked: {error}");
            return Err(error);
        }
        if !self.submitted {
            self.mount_banner();
        }
        let size = self.exporter.config().size;
        self.exporter
            .export_banner(&mut self.tree, BANNER_TARGET_ID, size, &self.profile.name)
    }

    pub fn exported(&self) -> Option<&ExportedImage> {
        self.exporter.image()
    }

    pub fn attach_hosted_url(&mut self, url: Url) -> Option<&ExportedImage> {
        self.exporter.attach_hosted_url(url)
    }

    /// `None` until an export has finished.
    pub fn share_url(&self, target: ShareTarget) -> Option<Url> {
        build_share_url(target, self.exporter.image(), &self.site, self.share_mode)
    }

    fn mount_banner(&mut self) {
        self.submitted = true;
        self.tree.mount(BANNER_TARGET_ID, self.preview());
        log::debug!("mounted banner for '{}'", self.profile.name.trim());
    }

    fn refresh(&mut self) {
        if self.submitted {
            let banner = self.preview();
            self.tree.update(BANNER_TARGET_ID, banner);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::Result;
    use image::{Rgba, RgbaImage};

    use super::BannerSession;
    use crate::background::BackgroundSpec;
    use crate::capture::PixelSize;
    use crate::catalog::TechCatalog;
    use crate::error::BannerError;
    use crate::export::{ExportConfig, MemorySink, SnapshotExporter};
    use crate::layout::RenderedBanner;
    use crate::profile::{BannerProfile, StackSelection};
    use crate::raster::Rasterize;
    use crate::share::{ShareContentMode, ShareTarget, SiteMetadata};

    struct Blank;

    impl Rasterize for Blank {
        fn rasterize(&self, banner: &RenderedBanner) -> Result<RgbaImage> {
            Ok(RgbaImage::from_pixel(banner.width, banner.height, Rgba([0, 0, 0, 255])))
        }
    }

    fn session() -> (BannerSession, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let exporter = SnapshotExporter::new(
            Arc::new(Blank),
            sink.clone(),
            ExportConfig {
                pacing: Duration::ZERO,
                timeout: Duration::from_secs(5),
                size: PixelSize::new(150, 50),
            },
        );
        let session = BannerSession::new(
            TechCatalog::builtin(),
            exporter,
            SiteMetadata::default(),
            ShareContentMode::PromoteSite,
        );
        (session, sink)
    }

    fn ada() -> BannerProfile {
        BannerProfile {
            name: "Ada Lovelace".to_owned(),
            field: "Systems Engineer".to_owned(),
            twitter: "ada".to_owned(),
            github: "adalovelace".to_owned(),
            background: Some(BackgroundSpec::DefaultGradient),
            ..BannerProfile::default()
        }
    }

    #[test]
    fn ada_lovelace_end_to_end() {
        let (mut session, sink) = session();
        session.set_profile(ada());
        session.set_stack(StackSelection::from_ids(["python", "rust"]));
        assert!(session.share_url(ShareTarget::Twitter).is_none());

        let banner = session.submit().unwrap();
        assert_eq!(banner.title(), Some("Ada Lovelace"));
        assert_eq!(banner.subtitle(), Some("Systems Engineer_"));
        assert_eq!(banner.stack_icons(), vec!["python", "rust"]);
        assert_eq!(banner.background, BackgroundSpec::DefaultGradient);
        assert!(session.export_enabled());

        let image = session.export().unwrap();
        assert_eq!(image.file_name, "ada-lovelace-banner.png");
        assert_eq!(sink.files()[0].0, "ada-lovelace-banner.png");

        let url = session.share_url(ShareTarget::Twitter).unwrap();
        let raw = url.as_str();
        assert!(raw.contains(
            "text=Check+out+my+new+customized+banner%21+You+can+also+get+yours+at+https%3A%2F%2Fbannerly.vercel.app"
        ));
        let site_links = url
            .query_pairs()
            .filter(|(_, value)| value == "https://bannerly.vercel.app")
            .count();
        assert_eq!(site_links, 1);
    }

    #[test]
    fn empty_name_is_rejected_and_export_stays_disabled() {
        let (mut session, sink) = session();
        session.set_profile(BannerProfile {
            name: String::new(),
            ..ada()
        });

        let error = session.submit().unwrap_err();
        match &error {
            BannerError::Validation(errors) => assert!(errors.has_field("name")),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(!session.export_enabled());
        assert!(matches!(session.export(), Err(BannerError::Validation(_))));
        assert!(sink.files().is_empty());
        assert!(session.share_url(ShareTarget::LinkedIn).is_none());
    }

    #[test]
    fn edits_after_submit_reach_the_export() {
        let (mut session, _sink) = session();
        session.set_profile(ada());
        session.submit().unwrap();

        session.toggle_tech("go");
        session.set_profile(BannerProfile {
            name: "Grace Hopper".to_owned(),
            ..ada()
        });
        let image = session.export().unwrap();
        assert_eq!(image.file_name, "grace-hopper-banner.png");
        assert_eq!(session.preview().stack_icons(), vec!["go"]);
    }

    #[test]
    fn clearing_the_name_after_submit_blocks_export() {
        let (mut session, sink) = session();
        session.set_profile(ada());
        session.submit().unwrap();
        assert!(session.export_enabled());

        session.set_profile(BannerProfile {
            name: String::new(),
            ..ada()
        });
        assert!(!session.export_enabled());
        match session.export() {
            Err(BannerError::Validation(errors)) => assert!(errors.has_field("name")),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(sink.files().is_empty());

        session.set_profile(ada());
        assert!(session.export_enabled());
        assert_eq!(session.export().unwrap().file_name, "ada-lovelace-banner.png");
    }

    #[test]
    fn valid_draft_exports_without_an_explicit_submit() {
        let (mut session, sink) = session();
        session.set_profile(ada());
        session.set_stack(StackSelection::from_ids(["rust"]));

        let image = session.export().unwrap();
        assert_eq!(image.file_name, "ada-lovelace-banner.png");
        assert_eq!(sink.files().len(), 1);
        assert!(session.export_enabled());
    }

    #[test]
    fn failed_resubmit_withdraws_the_banner() {
        let (mut session, _sink) = session();
        session.set_profile(ada());
        session.submit().unwrap();
        session.set_profile(BannerProfile {
            field: " ".to_owned(),
            ..ada()
        });
        assert!(session.submit().is_err());
        assert!(!session.export_enabled());
    }
}
