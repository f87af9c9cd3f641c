//! Spoof profile catalog and package classification lists.
//!
//! Profiles are built once at startup from reference fingerprints. The
//! fingerprint parsers here are pure and deterministic; malformed input
//! degrades to an empty string rather than an error.

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use pixelprops_core::config::CertifiedProps;
use pixelprops_core::field::{BuildField, IdentityFieldSet};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Flagship reference fingerprint (Pixel 8 Pro).
pub const PIXEL_8_PRO_FINGERPRINT: &str =
    "google/husky/husky:14/UD1A.230803.041/10808477:user/release-keys";

/// Baseline reference fingerprint (Pixel 5a).
pub const PIXEL_5A_FINGERPRINT: &str =
    "google/barbet/barbet:14/UP1A.231005.007/10754064:user/release-keys";

/// Oldest reference fingerprint (Pixel XL).
pub const PIXEL_XL_FINGERPRINT: &str =
    "google/marlin/marlin:10/QP1A.191005.007.A3/5972272:user/release-keys";

/// Default build type written by every profile.
pub const DEFAULT_BUILD_TYPE: &str = "user";

/// Default build tags written by every profile.
pub const DEFAULT_BUILD_TAGS: &str = "release-keys";

fn build_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9]+\.[0-9]+\.[0-9]+\.[A-Za-z0-9_]+").expect("static pattern")
    })
}

fn short_build_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9]+\.[0-9]+\.[0-9]+$").expect("static pattern"))
}

/// Extract the build ID from a fingerprint.
///
/// Returns the first `<alnum>.<digits>.<digits>.<word>` token. When there is
/// none, a slash segment that is exactly `<alnum>.<digits>.<digits>` is
/// accepted (plain release IDs such as `UD1A.230803.041`). Otherwise empty.
pub fn build_id(fingerprint: &str) -> String {
    if let Some(m) = build_id_pattern().find(fingerprint) {
        return m.as_str().to_string();
    }
    fingerprint
        .split('/')
        .find(|segment| short_build_id_pattern().is_match(segment))
        .unwrap_or_default()
        .to_string()
}

/// Extract the device name (second slash segment) from a fingerprint.
pub fn device_name(fingerprint: &str) -> String {
    fingerprint.split('/').nth(1).unwrap_or_default().to_string()
}

/// Named identity field set for one reference device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpoofProfile {
    pub name: String,
    pub fields: IdentityFieldSet,
}

impl SpoofProfile {
    pub fn new(name: impl Into<String>, fields: IdentityFieldSet) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }
}

/// Build a Google reference profile from its fingerprint.
pub fn load_profile(name: &str, fingerprint: &str, device: &str, model: &str) -> SpoofProfile {
    let fields = IdentityFieldSet::builder()
        .set(BuildField::Brand, "google")
        .set(BuildField::Manufacturer, "Google")
        .set(BuildField::Id, build_id(fingerprint))
        .set(BuildField::Device, device)
        .set(BuildField::Product, device)
        .set(BuildField::Model, model)
        .set(BuildField::Fingerprint, fingerprint)
        .set(BuildField::Type, DEFAULT_BUILD_TYPE)
        .set(BuildField::Tags, DEFAULT_BUILD_TAGS)
        .build();
    SpoofProfile::new(name, fields)
}

/// Build the "Certified" profile from configuration.
///
/// Returns `None` when nothing is configured. Empty entries fall back to
/// values derived from the configured fingerprint, or to the user /
/// release-keys defaults.
pub fn certified_profile(props: &CertifiedProps) -> Option<SpoofProfile> {
    if props.is_empty() {
        return None;
    }

    let or_else = |value: &str, fallback: String| {
        if value.is_empty() {
            fallback
        } else {
            value.to_string()
        }
    };
    let derived_device = device_name(&props.fingerprint);
    let sdk = props
        .initial_sdk
        .parse::<i64>()
        .ok()
        .filter(|_| props.initial_sdk.bytes().all(|b| b.is_ascii_digit()));

    let mut builder = IdentityFieldSet::builder()
        .set(BuildField::Product, or_else(&props.product, derived_device.clone()))
        .set(BuildField::Device, or_else(&props.device, derived_device))
        .set(BuildField::Manufacturer, props.manufacturer.as_str())
        .set(BuildField::Brand, props.brand.as_str())
        .set(BuildField::Model, props.model.as_str())
        .set(BuildField::Fingerprint, props.fingerprint.as_str())
        .set_if(
            !props.security_patch.is_empty(),
            BuildField::SecurityPatch,
            props.security_patch.as_str(),
        )
        .set(BuildField::Id, or_else(&props.build_id, build_id(&props.fingerprint)))
        .set(
            BuildField::Type,
            or_else(&props.build_type, DEFAULT_BUILD_TYPE.to_string()),
        )
        .set(BuildField::Tags, or_else(&props.tags, DEFAULT_BUILD_TAGS.to_string()));
    if let Some(sdk) = sdk {
        builder = builder.set(BuildField::DeviceInitialSdkInt, sdk);
    }

    Some(SpoofProfile::new("Certified", builder.build()))
}

/// Which built-in profile a package resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    /// Pixel 8 Pro
    Flagship,
    /// Pixel 5a
    Baseline,
    /// Pixel XL
    Oldest,
}

/// The built-in reference profiles.
#[derive(Debug, Clone)]
pub struct ProfileCatalog {
    flagship: SpoofProfile,
    baseline: SpoofProfile,
    oldest: SpoofProfile,
}

impl ProfileCatalog {
    pub fn get(&self, kind: ProfileKind) -> &SpoofProfile {
        match kind {
            ProfileKind::Flagship => &self.flagship,
            ProfileKind::Baseline => &self.baseline,
            ProfileKind::Oldest => &self.oldest,
        }
    }
}

impl Default for ProfileCatalog {
    fn default() -> Self {
        Self {
            flagship: load_profile("Pixel 8 Pro", PIXEL_8_PRO_FINGERPRINT, "husky", "Pixel 8 Pro"),
            baseline: load_profile("Pixel 5a", PIXEL_5A_FINGERPRINT, "barbet", "Pixel 5a"),
            oldest: load_profile("Pixel XL", PIXEL_XL_FINGERPRINT, "marlin", "Pixel XL"),
        }
    }
}

/// Well-known package identifiers.
pub mod packages {
    pub const GMS: &str = "com.google.android.gms";
    pub const STORE: &str = "com.android.vending";
    pub const SETUP_WIZARD: &str = "com.google.android.setupwizard";
    pub const PHOTOS: &str = "com.google.android.apps.photos";
    pub const SETTINGS_INTELLIGENCE: &str = "com.google.android.settings.intelligence";
}

const FLAGSHIP_TARGETS: &[&str] = &[
    "com.google.android.apps.customization.pixel",
    "com.google.android.apps.privacy.wildlife",
    "com.google.android.apps.wallpaper.pixel",
    "com.google.android.apps.wallpaper",
    "com.google.android.apps.subscriptions.red",
    "com.google.pixel.livewallpaper",
    "com.google.android.wallpaper.effects",
    "com.google.android.apps.emojiwallpaper",
    "com.google.android.apps.aiwallpapers",
];

const EXTRA_ELIGIBLE: &[&str] = &[
    "com.android.chrome",
    "com.breel.wallpapers20",
    "com.nhs.online.nhsonline",
    "com.netflix.mediaclient",
    "com.nothing.smartcenter",
];

const ALWAYS_EXEMPT: &[&str] = &[
    "com.google.android.apps.motionsense.bridge",
    "com.google.android.apps.pixelmigrate",
    "com.google.android.dialer",
    "com.google.android.euicc",
    "com.google.ar.core",
    "com.google.android.youtube",
    "com.google.android.apps.youtube.kids",
    "com.google.android.apps.youtube.music",
    "com.google.android.apps.recorder",
    "com.google.android.apps.wearables.maestro.companion",
    "com.google.android.apps.tachyon",
    "com.google.android.apps.tycho",
    "com.google.android.as",
    "com.google.android.gms",
    "com.google.android.apps.restore",
    "com.google.oslo",
];

const CAMERA_PREFIX: &str = "com.google.android.GoogleCamera";

const CAMERA_PACKAGES: &[&str] = &[
    "com.google.android.MTCL83",
    "com.google.android.UltraCVM",
    "com.google.android.apps.cameralite",
];

// Codenames of currently supported Pixels
const REFERENCE_CODENAMES: &[&str] = &[
    "husky", "shiba", "felix", "tangorpro", "lynx", "cheetah", "panther", "bluejay", "oriole",
    "raven", "barbet", "redfin", "bramble", "sunfish",
];

const ELIGIBLE_PREFIXES: &[&str] = &["com.google.", "com.samsung."];

/// Static package classification rules.
#[derive(Debug, Clone)]
pub struct PackageRules {
    always_exempt: BTreeSet<String>,
    flagship_targets: BTreeSet<String>,
    extra_eligible: BTreeSet<String>,
    camera_packages: BTreeSet<String>,
    reference_codenames: BTreeSet<String>,
    exclusions: HashMap<String, BTreeSet<BuildField>>,
    generic_override: IdentityFieldSet,
}

fn to_set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for PackageRules {
    fn default() -> Self {
        let mut exclusions = HashMap::new();
        exclusions.insert(
            packages::SETTINGS_INTELLIGENCE.to_string(),
            BTreeSet::from([BuildField::Fingerprint]),
        );

        Self {
            always_exempt: to_set(ALWAYS_EXEMPT),
            flagship_targets: to_set(FLAGSHIP_TARGETS),
            extra_eligible: to_set(EXTRA_ELIGIBLE),
            camera_packages: to_set(CAMERA_PACKAGES),
            reference_codenames: to_set(REFERENCE_CODENAMES),
            exclusions,
            generic_override: IdentityFieldSet::builder()
                .set(BuildField::Type, DEFAULT_BUILD_TYPE)
                .set(BuildField::Tags, DEFAULT_BUILD_TAGS)
                .build(),
        }
    }
}

impl PackageRules {
    pub fn is_exempt(&self, package: &str) -> bool {
        self.always_exempt.contains(package)
    }

    pub fn is_camera(&self, package: &str) -> bool {
        package.starts_with(CAMERA_PREFIX) || self.camera_packages.contains(package)
    }

    pub fn is_eligible(&self, package: &str) -> bool {
        ELIGIBLE_PREFIXES.iter().any(|p| package.starts_with(p))
            || self.extra_eligible.contains(package)
    }

    pub fn is_flagship_target(&self, package: &str) -> bool {
        self.flagship_targets.contains(package)
    }

    pub fn is_reference_device(&self, codename: &str) -> bool {
        self.reference_codenames.contains(codename)
    }

    /// Fields never overridden for this package.
    pub fn exclusions_for(&self, package: &str) -> BTreeSet<BuildField> {
        self.exclusions.get(package).cloned().unwrap_or_default()
    }

    /// Fields applied to every process before classification.
    pub fn generic_override(&self) -> &IdentityFieldSet {
        &self.generic_override
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixelprops_core::field::FieldValue;

    #[test]
    fn test_device_name() {
        assert_eq!(device_name(PIXEL_8_PRO_FINGERPRINT), "husky");
        assert_eq!(device_name("brand/device"), "device");
        assert_eq!(device_name("nodelimiters"), "");
        assert_eq!(device_name(""), "");
    }

    #[test]
    fn test_build_id_four_part_token() {
        assert_eq!(build_id(PIXEL_XL_FINGERPRINT), "QP1A.191005.007.A3");
        assert_eq!(build_id("prefix AB1.2.3.x_y suffix CD2.4.5.z"), "AB1.2.3.x_y");
    }

    #[test]
    fn test_build_id_plain_release_segment() {
        assert_eq!(build_id(PIXEL_8_PRO_FINGERPRINT), "UD1A.230803.041");
        assert_eq!(build_id(PIXEL_5A_FINGERPRINT), "UP1A.231005.007");
    }

    #[test]
    fn test_build_id_ignores_dotted_version() {
        let fp = "google/walleye/walleye:8.1.0/OPM1.171019.011/4448085:user/release-keys";
        assert_eq!(build_id(fp), "OPM1.171019.011");
    }

    #[test]
    fn test_build_id_malformed() {
        assert_eq!(build_id(""), "");
        assert_eq!(build_id("google/husky/husky:14"), "");
    }

    #[test]
    fn test_parsers_are_idempotent() {
        for fp in [PIXEL_8_PRO_FINGERPRINT, PIXEL_XL_FINGERPRINT, "x", ""] {
            assert_eq!(build_id(fp), build_id(fp));
            assert_eq!(device_name(fp), device_name(fp));
        }
    }

    #[test]
    fn test_load_profile_fields() {
        let profile = load_profile("Pixel 8 Pro", PIXEL_8_PRO_FINGERPRINT, "husky", "Pixel 8 Pro");
        let f = &profile.fields;
        assert_eq!(f.get(BuildField::Brand), Some(&FieldValue::from("google")));
        assert_eq!(f.get(BuildField::Manufacturer), Some(&FieldValue::from("Google")));
        assert_eq!(f.get(BuildField::Id), Some(&FieldValue::from("UD1A.230803.041")));
        assert_eq!(f.get(BuildField::Device), Some(&FieldValue::from("husky")));
        assert_eq!(f.get(BuildField::Product), Some(&FieldValue::from("husky")));
        assert_eq!(f.get(BuildField::Type), Some(&FieldValue::from("user")));
        assert_eq!(f.len(), 9);
    }

    #[test]
    fn test_catalog_profiles() {
        let catalog = ProfileCatalog::default();
        assert_eq!(catalog.get(ProfileKind::Flagship).name, "Pixel 8 Pro");
        assert_eq!(catalog.get(ProfileKind::Baseline).name, "Pixel 5a");
        assert_eq!(
            catalog.get(ProfileKind::Oldest).fields.get(BuildField::Fingerprint),
            Some(&FieldValue::from(PIXEL_XL_FINGERPRINT))
        );
    }

    #[test]
    fn test_certified_profile_empty_config() {
        assert!(certified_profile(&CertifiedProps::default()).is_none());
    }

    #[test]
    fn test_certified_profile_fallbacks() {
        let props = CertifiedProps {
            manufacturer: "Google".to_string(),
            brand: "google".to_string(),
            model: "Pixel 5a".to_string(),
            fingerprint: PIXEL_5A_FINGERPRINT.to_string(),
            initial_sdk: "30".to_string(),
            ..Default::default()
        };
        let profile = certified_profile(&props).unwrap();
        let f = &profile.fields;
        assert_eq!(profile.name, "Certified");
        assert_eq!(f.get(BuildField::Product), Some(&FieldValue::from("barbet")));
        assert_eq!(f.get(BuildField::Device), Some(&FieldValue::from("barbet")));
        assert_eq!(f.get(BuildField::Id), Some(&FieldValue::from("UP1A.231005.007")));
        assert_eq!(f.get(BuildField::Type), Some(&FieldValue::from("user")));
        assert_eq!(f.get(BuildField::Tags), Some(&FieldValue::from("release-keys")));
        assert_eq!(f.get(BuildField::DeviceInitialSdkInt), Some(&FieldValue::Int(30)));
        assert!(!f.contains(BuildField::SecurityPatch));
    }

    #[test]
    fn test_certified_profile_explicit_values_win() {
        let props = CertifiedProps {
            product: "prod".to_string(),
            device: "dev".to_string(),
            fingerprint: PIXEL_5A_FINGERPRINT.to_string(),
            security_patch: "2024-01-05".to_string(),
            initial_sdk: "3x".to_string(),
            build_id: "ABC.1.2".to_string(),
            build_type: "userdebug".to_string(),
            tags: "dev-keys".to_string(),
            ..Default::default()
        };
        let f = certified_profile(&props).unwrap().fields;
        assert_eq!(f.get(BuildField::Product), Some(&FieldValue::from("prod")));
        assert_eq!(f.get(BuildField::Device), Some(&FieldValue::from("dev")));
        assert_eq!(f.get(BuildField::Id), Some(&FieldValue::from("ABC.1.2")));
        assert_eq!(f.get(BuildField::Type), Some(&FieldValue::from("userdebug")));
        assert_eq!(f.get(BuildField::Tags), Some(&FieldValue::from("dev-keys")));
        assert_eq!(
            f.get(BuildField::SecurityPatch),
            Some(&FieldValue::from("2024-01-05"))
        );
        // non-numeric sdk is dropped
        assert!(!f.contains(BuildField::DeviceInitialSdkInt));
    }

    #[test]
    fn test_rules_membership() {
        let rules = PackageRules::default();
        assert!(rules.is_exempt("com.google.android.youtube"));
        assert!(rules.is_exempt(packages::GMS));
        assert!(rules.is_camera("com.google.android.GoogleCameraEng"));
        assert!(rules.is_camera("com.google.android.MTCL83"));
        assert!(!rules.is_camera("com.google.android.apps.photos"));
        assert!(rules.is_eligible("com.samsung.android.app"));
        assert!(rules.is_eligible("com.netflix.mediaclient"));
        assert!(!rules.is_eligible("org.mozilla.firefox"));
        assert!(rules.is_flagship_target("com.google.android.apps.wallpaper"));
        assert!(rules.is_reference_device("raven"));
        assert!(!rules.is_reference_device("marlin"));
    }

    #[test]
    fn test_rules_exclusions_and_generic_override() {
        let rules = PackageRules::default();
        assert_eq!(
            rules.exclusions_for(packages::SETTINGS_INTELLIGENCE),
            BTreeSet::from([BuildField::Fingerprint])
        );
        assert!(rules.exclusions_for("com.android.chrome").is_empty());

        let generic = rules.generic_override();
        assert_eq!(generic.len(), 2);
        assert_eq!(generic.get(BuildField::Tags), Some(&FieldValue::from("release-keys")));
    }
}
