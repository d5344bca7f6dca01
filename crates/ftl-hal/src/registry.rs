//! [`ProfileRegistry`] – the table of hardware profiles selectable by name.
//!
//! Profiles are compiled in; there is no runtime discovery.  Selecting an
//! unknown name resolves to the `"sim"` profile (see
//! [`Registry::resolve`][ftl_types::Registry::resolve]).

use ftl_types::Registry;

use crate::profile::HardwareProfile;
use crate::sim::{SIM_PROFILE_KEY, sim_profile};

/// Builds a fresh [`HardwareProfile`].
pub type ProfileFactory = fn() -> HardwareProfile;

/// Name → profile table with `"sim"` as the fallback.
pub type ProfileRegistry = Registry<ProfileFactory>;

/// Registry holding every profile shipped with this crate.
pub fn builtin_profiles() -> ProfileRegistry {
    Registry::<ProfileFactory>::new("profile", SIM_PROFILE_KEY).with(SIM_PROFILE_KEY, sim_profile)
}
