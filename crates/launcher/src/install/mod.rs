//! Installation provisioners
//!
//! Everything that turns remote releases, packages and manifests into the
//! on-disk installation layout: the injector framework, the managed
//! runtime, and the content-asset bundle, plus the layout and version
//! markers they share.

pub mod assets;
pub mod error;
pub mod files;
pub mod injector;
pub mod layout;
pub mod marker;
pub mod remote;
pub mod runtime;

pub use assets::AssetInstaller;
pub use error::{InstallError, Result};
pub use injector::InjectorInstaller;
pub use layout::InstallLayout;
pub use marker::VersionMarker;
pub use remote::{AssetFile, AssetManifest, ReleaseAsset, ReleaseDescriptor};
pub use runtime::RuntimeInstaller;
