use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use ahash::RandomState;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::{
    error::StoreError,
    profile::store::{InMemoryProfileStore, Profile, RecipientId},
};

/// Serializable snapshot of an [`InMemoryProfileStore`]
/// Profiles are ordered by recipient so equal stores encode to equal bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileStoreData {
    pub profiles: Vec<(RecipientId, Profile)>,
}

impl ProfileStoreData {
    /// `ProfileStoreData`から`InMemoryProfileStore`に変換します。
    pub fn into_store(self) -> InMemoryProfileStore {
        let profiles = DashMap::with_capacity_and_hasher(self.profiles.len(), RandomState::new());
        for (id, profile) in self.profiles {
            profiles.insert(id, profile);
        }
        InMemoryProfileStore { profiles }
    }
}

impl InMemoryProfileStore {
    pub fn to_data(&self) -> ProfileStoreData {
        let mut profiles: Vec<(RecipientId, Profile)> = self
            .profiles
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        profiles.sort_by(|a, b| a.0.cmp(&b.0));
        ProfileStoreData { profiles }
    }

    /// Encode every profile as CBOR
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), StoreError> {
        serde_cbor::to_writer(writer, &self.to_data())?;
        Ok(())
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, StoreError> {
        let data: ProfileStoreData = serde_cbor::from_reader(reader)?;
        Ok(data.into_store())
    }

    /// Write a snapshot to `path`
    /// The file is written next to the target and renamed over it, so a
    /// crash never leaves a half-written snapshot behind.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        let path = path.as_ref();
        let tmp = sibling_tmp(path);
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            self.to_writer(&mut writer)?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Load a snapshot, or start empty when `path` does not exist yet
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        Self::from_reader(BufReader::new(File::open(path)?))
    }
}

/// `profiles.cbor` -> `profiles.cbor.tmp`, never the target itself
fn sibling_tmp(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
