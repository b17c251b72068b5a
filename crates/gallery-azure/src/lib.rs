//! Gallery Azure - production collaborators for the image gallery
//!
//! Provides:
//! - [`AzureBlobStore`]: Azure Blob Storage over the REST API, SAS-token auth
//! - [`DataverseMetadataStore`]: image records through the Dataverse Web API
//!
//! # Example
//!
//! ```rust,ignore
//! use gallery_azure::{AzureBlobConfig, AzureBlobStore, DataverseConfig, DataverseMetadataStore};
//!
//! let blobs = AzureBlobStore::new(&AzureBlobConfig::new("acct", "property-images"))?;
//! let records = DataverseMetadataStore::new(
//!     DataverseConfig::new("https://org.crm.dynamics.com".parse()?).with_token(token),
//! )?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod blob;
pub mod dataverse;
mod http;

pub use blob::{AzureBlobConfig, AzureBlobStore, API_VERSION, DEFAULT_BLOCK_SIZE};
pub use dataverse::{DataverseConfig, DataverseMetadataStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
