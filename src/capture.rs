//! The render tree that holds capture targets, and scoped acquisition of a
//! target at a fixed pixel size.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::BannerError;
use crate::layout::RenderedBanner;

/// Stable id the session mounts its full-fidelity banner under.
pub const BANNER_TARGET_ID: &str = "banner";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Hidden,
    Visible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BoxSize {
    Auto,
    Fixed { width: u32, height: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SurfaceStyle {
    pub visibility: Visibility,
    pub size: BoxSize,
}

impl SurfaceStyle {
    /// Mounted but out of sight: the state a capture target lives in between
    /// exports.
    pub const HIDDEN: Self = Self {
        visibility: Visibility::Hidden,
        size: BoxSize::Auto,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone)]
struct CaptureNode {
    style: SurfaceStyle,
    banner: RenderedBanner,
    /// What layout produces at the current style; equals `banner` at auto size.
    laid_out: RenderedBanner,
    layout_passes: u64,
}

/// Nodes addressable by stable id. Only the snapshot exporter changes their
/// style, and only through a [`CaptureSurface`].
#[derive(Debug, Clone, Default)]
pub struct RenderTree {
    nodes: BTreeMap<String, CaptureNode>,
}

impl RenderTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mounts `banner` hidden at auto size, or replaces the banner of an
    /// existing node while keeping its style.
    pub fn mount(&mut self, id: &str, banner: RenderedBanner) {
        if self.nodes.contains_key(id) {
            self.update(id, banner);
        } else {
            self.nodes.insert(
                id.to_owned(),
                CaptureNode {
                    style: SurfaceStyle::HIDDEN,
                    laid_out: banner.clone(),
                    banner,
                    layout_passes: 0,
                },
            );
        }
    }

    /// Replaces the banner of a mounted node. Returns false when `id` is not
    /// mounted.
    pub fn update(&mut self, id: &str, banner: RenderedBanner) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.banner = banner;
                reflow(node);
                true
            }
            None => false,
        }
    }

    pub fn unmount(&mut self, id: &str) -> Option<RenderedBanner> {
        self.nodes.remove(id).map(|node| node.banner)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn style(&self, id: &str) -> Option<SurfaceStyle> {
        self.nodes.get(id).map(|node| node.style)
    }

    pub fn banner(&self, id: &str) -> Option<&RenderedBanner> {
        self.nodes.get(id).map(|node| &node.banner)
    }

    pub fn layout_passes(&self, id: &str) -> Option<u64> {
        self.nodes.get(id).map(|node| node.layout_passes)
    }
}

fn reflow(node: &mut CaptureNode) {
    node.laid_out = match node.style.size {
        BoxSize::Auto => node.banner.clone(),
        BoxSize::Fixed { width, height } => node.banner.scaled_to(width, height),
    };
    node.layout_passes += 1;
}

/// A capture target held visible at a forced size. The original style is
/// put back when the guard drops, whatever path the capture took.
pub struct CaptureSurface<'a> {
    tree: &'a mut RenderTree,
    id: String,
    original: SurfaceStyle,
}

impl<'a> CaptureSurface<'a> {
    /// Fails without touching the tree when `id` is not mounted.
    pub fn acquire(
        tree: &'a mut RenderTree,
        id: &str,
        size: PixelSize,
    ) -> Result<Self, BannerError> {
        let node = tree
            .nodes
            .get_mut(id)
            .ok_or_else(|| BannerError::CaptureTargetMissing { id: id.to_owned() })?;

        let original = node.style;
        node.style = SurfaceStyle {
            visibility: Visibility::Visible,
            size: BoxSize::Fixed {
                width: size.width,
                height: size.height,
            },
        };
        reflow(node);
        log::debug!(
            "acquired capture target '{id}' at {}x{} (pass {})",
            size.width,
            size.height,
            node.layout_passes
        );

        Ok(Self {
            tree,
            id: id.to_owned(),
            original,
        })
    }

    /// The tree as laid out at the forced size.
    pub fn banner(&self) -> &RenderedBanner {
        &self.node().laid_out
    }

    pub fn style(&self) -> SurfaceStyle {
        self.node().style
    }

    fn node(&self) -> &CaptureNode {
        // acquire() proved the node exists and the guard holds the only
        // mutable borrow of the tree, so it cannot have been unmounted.
        &self.tree.nodes[&self.id]
    }
}

impl Drop for CaptureSurface<'_> {
    fn drop(&mut self) {
        if let Some(node) = self.tree.nodes.get_mut(&self.id) {
            node.style = self.original;
            reflow(node);
            log::debug!("released capture target '{}'", self.id);
        }
    }
}
