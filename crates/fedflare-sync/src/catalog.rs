//! Static catalog of the repositories a project publishes.
//!
//! The catalog is pure data: the same project id always yields the same,
//! identically ordered releases and segments.

use crate::location::RepositoryLocation;

/// A release as declared for a project, before segments are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseSpec {
    pub name: &'static str,
    pub alias: Option<&'static str>,
}

const fn release(name: &'static str) -> ReleaseSpec {
    ReleaseSpec { name, alias: None }
}

const EPEL: &[ReleaseSpec] = &[
    ReleaseSpec {
        name: "7",
        alias: Some("7Server"),
    },
    release("8/Everything"),
    release("8/Modular"),
    release("next/8/Everything"),
    release("playground/8/Everything"),
    release("testing/7"),
    release("testing/8/Everything"),
    release("testing/8/Modular"),
    release("testing/next/8/Everything"),
];

/// Rules that turn a release name into its sub-repository segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRules {
    pub architectures: Vec<String>,
    /// First major version that no longer ships `ppc64`.
    pub ppc64_cutoff: u32,
    /// Release name prefix marking a playground variant.
    pub playground_prefix: String,
}

impl Default for CatalogRules {
    fn default() -> Self {
        Self {
            architectures: ["aarch64", "ppc64", "ppc64le", "x86_64"]
                .map(String::from)
                .to_vec(),
            ppc64_cutoff: 8,
            playground_prefix: "playground/".to_string(),
        }
    }
}

impl CatalogRules {
    /// Segments for one release, in publish order:
    /// `SRPMS` (non-playground), `source/tree`, then base and debug trees
    /// per architecture.
    pub fn segments(&self, release: &str) -> Vec<String> {
        let playground = release.starts_with(&self.playground_prefix);
        let drops_ppc64 = release_major(release).is_some_and(|major| major >= self.ppc64_cutoff);

        let mut segments = Vec::with_capacity(2 + 2 * self.architectures.len());
        if !playground {
            segments.push("SRPMS".to_string());
        }
        segments.push("source/tree".to_string());

        for arch in &self.architectures {
            if drops_ppc64 && arch == "ppc64" {
                continue;
            }
            if playground {
                segments.push(format!("{arch}/os"));
                segments.push(format!("{arch}/debug/tree"));
            } else {
                segments.push(arch.clone());
                segments.push(format!("{arch}/debug"));
            }
        }
        segments
    }
}

/// Major version of a release name: its first all-digit path component.
///
/// `testing/next/8/Everything` is 8, `7` is 7.
pub fn release_major(release: &str) -> Option<u32> {
    release
        .split('/')
        .find(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|part| part.parse().ok())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub name: String,
    pub alias: Option<String>,
    pub segments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    project: String,
    releases: Vec<Release>,
}

impl Catalog {
    /// The built-in catalog for a project, if one is defined.
    pub fn for_project(project: &str) -> Option<Self> {
        let specs = match project {
            "epel" => EPEL,
            _ => return None,
        };
        Some(Self::with_rules(project, specs, &CatalogRules::default()))
    }

    pub fn with_rules(project: &str, specs: &[ReleaseSpec], rules: &CatalogRules) -> Self {
        let releases = specs
            .iter()
            .map(|spec| Release {
                name: spec.name.to_string(),
                alias: spec.alias.map(String::from),
                segments: rules.segments(spec.name),
            })
            .collect();
        Self {
            project: project.to_string(),
            releases,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn releases(&self) -> &[Release] {
        &self.releases
    }

    pub fn release(&self, name: &str) -> Option<&Release> {
        self.releases.iter().find(|r| r.name == name)
    }

    /// Path prefix under which the project is published, e.g. `/pub/epel/`.
    pub fn publish_prefix(&self) -> String {
        publish_prefix(&self.project)
    }

    /// One location per (release, segment) pair, aliases attached.
    pub fn locations(&self) -> Vec<RepositoryLocation> {
        let prefix = self.publish_prefix();
        self.releases
            .iter()
            .flat_map(|release| {
                let prefix = &prefix;
                release.segments.iter().map(move |segment| {
                    RepositoryLocation::new(format!("{prefix}{}/{segment}", release.name))
                        .with_alias(
                            release
                                .alias
                                .as_ref()
                                .map(|alias| format!("{prefix}{alias}/{segment}")),
                        )
                })
            })
            .collect()
    }

    /// Alias path for a location path under an aliased release.
    pub fn alias_for(&self, path: &str) -> Option<String> {
        let prefix = self.publish_prefix();
        self.releases.iter().find_map(|release| {
            let alias = release.alias.as_ref()?;
            let canonical = format!("{prefix}{}/", release.name);
            path.strip_prefix(&canonical)
                .map(|rest| format!("{prefix}{alias}/{rest}"))
        })
    }
}

pub fn publish_prefix(project: &str) -> String {
    format!("/pub/{project}/")
}
