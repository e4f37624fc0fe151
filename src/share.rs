//! Social share links for an exported banner.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::error_codes::CodedError;
use crate::export::ExportedImage;

pub const DEFAULT_SITE_URL: &str = "https://bannerly.vercel.app";
pub const DEFAULT_HASHTAGS: &[&str] = &["bannerly", "techbanner"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareTarget {
    Twitter,
    Facebook,
    LinkedIn,
}

impl ShareTarget {
    pub const ALL: [&'static str; 4] = ["twitter", "x", "facebook", "linkedin"];

    pub fn from_keyword(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "twitter" | "x" => Ok(Self::Twitter),
            "facebook" => Ok(Self::Facebook),
            "linkedin" => Ok(Self::LinkedIn),
            _ => Err(CodedError::usage(
                "INVALID_SHARE_TARGET",
                format!("invalid share target '{value}'"),
            )
            .with_details(json!({ "provided": value, "allowed": Self::ALL }))
            .into()),
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Self::Twitter => "twitter",
            Self::Facebook => "facebook",
            Self::LinkedIn => "linkedin",
        }
    }

    fn endpoint(self) -> &'static str {
        match self {
            Self::Twitter => "https://x.com/intent/tweet",
            Self::Facebook => "https://www.facebook.com/sharer/sharer.php",
            Self::LinkedIn => "https://www.linkedin.com/sharing/share-offsite/",
        }
    }
}

/// What the shared link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareContentMode {
    #[default]
    PromoteSite,
    PromoteGeneratedImage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteMetadata {
    pub site_url: Url,
    pub promo_text: String,
    pub hashtags: Vec<String>,
}

impl SiteMetadata {
    pub fn new(site_url: Url) -> Self {
        let promo_text = default_promo_text(&site_url);
        Self {
            site_url,
            promo_text,
            hashtags: DEFAULT_HASHTAGS.iter().map(|tag| (*tag).to_owned()).collect(),
        }
    }
}

impl Default for SiteMetadata {
    fn default() -> Self {
        Self::new(Url::parse(DEFAULT_SITE_URL).expect("DEFAULT_SITE_URL is a valid url"))
    }
}

pub fn default_promo_text(site_url: &Url) -> String {
    format!(
        "Check out my new customized banner! You can also get yours at {}",
        display_url(site_url)
    )
}

/// The URL as a person would type it: no trailing slash on a bare origin.
fn display_url(url: &Url) -> String {
    let text = url.as_str();
    if url.path() == "/" && url.query().is_none() && url.fragment().is_none() {
        text.trim_end_matches('/').to_owned()
    } else {
        text.to_owned()
    }
}

/// `None` until an image has been exported.
pub fn build_share_url(
    target: ShareTarget,
    image: Option<&ExportedImage>,
    site: &SiteMetadata,
    mode: ShareContentMode,
) -> Option<Url> {
    let image = image?;
    let link = match (mode, image.hosted_url.as_ref()) {
        (ShareContentMode::PromoteSite, _) => display_url(&site.site_url),
        (ShareContentMode::PromoteGeneratedImage, Some(hosted)) => hosted.to_string(),
        (ShareContentMode::PromoteGeneratedImage, None) => {
            log::warn!(
                "{} was never uploaded; sharing the site link instead",
                image.file_name
            );
            display_url(&site.site_url)
        }
    };

    let mut url = Url::parse(target.endpoint()).ok()?;
    {
        let mut query = url.query_pairs_mut();
        match target {
            ShareTarget::Twitter => {
                query.append_pair("text", &site.promo_text);
                query.append_pair("url", &link);
                if !site.hashtags.is_empty() {
                    query.append_pair("hashtags", &site.hashtags.join(","));
                }
            }
            ShareTarget::Facebook => {
                query.append_pair("u", &link);
                query.append_pair("quote", &site.promo_text);
            }
            ShareTarget::LinkedIn => {
                query.append_pair("url", &link);
                query.append_pair("summary", &site.promo_text);
            }
        }
    }
    log::debug!("built {} share link", target.keyword());
    Some(url)
}
