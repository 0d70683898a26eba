use crate::resources::{BundleId, LoadKind, Record, RecordCore};
use crate::time::Timestamp;

/// A single typed resource obtained from within a bundle
#[derive(Clone, Debug)]
pub struct AssetRecord {
    core: RecordCore,
    asset_type: String,
    asset_name: String,
    owner_bundle: BundleId,
}

impl AssetRecord {
    pub(crate) fn new(
        path: impl Into<String>,
        asset_type: impl Into<String>,
        load_kind: LoadKind,
        owner_bundle: BundleId,
        now: Timestamp,
    ) -> Self {
        let core = RecordCore::new(path, load_kind, now);
        let asset_name = asset_name_of(core.path()).to_string();
        Self {
            core,
            asset_type: asset_type.into(),
            asset_name,
            owner_bundle,
        }
    }

    pub fn asset_type(&self) -> &str {
        &self.asset_type
    }

    /// Name passed to the byte loader (file stem of the path)
    pub fn asset_name(&self) -> &str {
        &self.asset_name
    }

    /// Bundle this asset was created from; never reassigned
    pub fn owner_bundle(&self) -> BundleId {
        self.owner_bundle
    }
}

impl Record for AssetRecord {
    fn core(&self) -> &RecordCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut RecordCore {
        &mut self.core
    }
}

/// File stem of an asset path: `"ui/icons/sword.png"` -> `"sword"`
pub fn asset_name_of(path: &str) -> &str {
    let file = path
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(path);
    match file.rfind('.') {
        Some(0) | None => file,
        Some(dot) => &file[..dot],
    }
}
