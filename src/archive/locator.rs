/// Suffix appended to an archive name when no path template is configured.
pub const DEFAULT_ARCHIVE_SUFFIX: &str = ".pmtiles";

/// Optional path segment that groups archives by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subdirectory {
    Vector,
    Raster,
}

impl Subdirectory {
    /// Parse a path segment. Only the fixed set of tags is recognised.
    pub fn parse(segment: &str) -> Option<Self> {
        match segment {
            "vector" => Some(Subdirectory::Vector),
            "raster" => Some(Subdirectory::Raster),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Subdirectory::Vector => "vector",
            Subdirectory::Raster => "raster",
        }
    }
}

/// Where an archive named in a URL lives in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLocator {
    pub name: String,
    pub subdirectory: Option<Subdirectory>,
    pub storage_key: String,
}

impl ArchiveLocator {
    /// Resolve the storage key for `name`.
    ///
    /// With a `template`, every `{name}` token is replaced by the archive
    /// name; otherwise the key is `{name}.pmtiles`. A subdirectory prefixes
    /// the resolved key.
    pub fn resolve(name: &str, subdirectory: Option<Subdirectory>, template: Option<&str>) -> Self {
        let base = match template {
            Some(template) => template.replace("{name}", name),
            None => format!("{}{}", name, DEFAULT_ARCHIVE_SUFFIX),
        };

        let storage_key = match subdirectory {
            Some(dir) => format!("{}/{}", dir.as_str(), base),
            None => base,
        };

        Self {
            name: name.to_string(),
            subdirectory,
            storage_key,
        }
    }

    /// Path of this archive relative to the public root, e.g. `vector/parks`.
    pub fn public_path(&self) -> String {
        match self.subdirectory {
            Some(dir) => format!("{}/{}", dir.as_str(), self.name),
            None => self.name.clone(),
        }
    }
}
