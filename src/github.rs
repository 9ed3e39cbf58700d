//! A thin client for the few endpoints of the GitHub REST API we need. The
//! rest of the crate talks to it through [`ReleaseSource`], so that the
//! pipeline can be driven by an in-memory source in tests.

use crate::impl_prelude::*;
use crate::staleness::{self, CommitInfo, ReleaseAsset, ReleaseInfo};

use serde::Deserialize;

pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";
/// Release assets are whole language packs, the default limit of `ureq` is
/// too small for them.
const MAX_RESPONSE_SIZE: u64 = 1 << 30;

assert_trait_is_object_safe!(ReleaseSource);
pub trait ReleaseSource {
  fn latest_release(&self, owner: &str, repo: &str) -> AnyResult<ReleaseInfo>;

  /// Scans the releases from the newest one and returns the first one with
  /// an asset whose (lowercased) name contains `keyword`.
  fn latest_release_with_asset(
    &self,
    owner: &str,
    repo: &str,
    keyword: &str,
  ) -> AnyResult<Option<ReleaseInfo>>;

  /// `Ok(None)` means the repository has no commits, which isn't an error.
  fn latest_commit(&self, owner: &str, repo: &str) -> AnyResult<Option<CommitInfo>>;

  fn download(&self, url: &str) -> AnyResult<Vec<u8>>;
}

#[derive(Debug, Deserialize)]
struct ReleaseSerde {
  tag_name: String,
  published_at: String,
  #[serde(default)]
  assets: Vec<AssetSerde>,
}

#[derive(Debug, Deserialize)]
struct AssetSerde {
  name: String,
  browser_download_url: String,
}

#[derive(Debug, Deserialize)]
struct CommitEntrySerde {
  commit: CommitSerde,
}

#[derive(Debug, Deserialize)]
struct CommitSerde {
  committer: CommitterSerde,
}

#[derive(Debug, Deserialize)]
struct CommitterSerde {
  date: String,
}

impl ReleaseSerde {
  fn into_release_info(self) -> AnyResult<ReleaseInfo> {
    Ok(ReleaseInfo {
      published_at: staleness::parse_timestamp(&self.published_at)
        .with_context(|| format!("Release {:?} has an invalid publication date", self.tag_name))?,
      tag: self.tag_name,
      assets: self
        .assets
        .into_iter()
        .map(|a| ReleaseAsset { name: a.name, download_url: a.browser_download_url })
        .collect(),
    })
  }
}

pub fn parse_release(bytes: &[u8]) -> AnyResult<ReleaseInfo> {
  let raw: ReleaseSerde =
    serde_json::from_slice(bytes).context("Failed to deserialize the release")?;
  raw.into_release_info()
}

pub fn parse_release_with_asset(bytes: &[u8], keyword: &str) -> AnyResult<Option<ReleaseInfo>> {
  let releases: Vec<ReleaseSerde> =
    serde_json::from_slice(bytes).context("Failed to deserialize the release list")?;
  let keyword = keyword.to_lowercase();
  for release in releases {
    if release.assets.iter().any(|asset| asset.name.to_lowercase().contains(&keyword)) {
      return release.into_release_info().map(Some);
    }
  }
  Ok(None)
}

pub fn parse_latest_commit(bytes: &[u8]) -> AnyResult<Option<CommitInfo>> {
  let commits: Vec<CommitEntrySerde> =
    serde_json::from_slice(bytes).context("Failed to deserialize the commit list")?;
  match commits.into_iter().next() {
    Some(entry) => Ok(Some(CommitInfo {
      committer_date: staleness::parse_timestamp(&entry.commit.committer.date)?,
    })),
    None => Ok(None),
  }
}

#[derive(Debug, Clone)]
pub struct GitHubClient {
  api_base_url: String,
  user_agent: String,
}

impl GitHubClient {
  pub fn new(api_base_url: &str) -> Self {
    Self {
      api_base_url: api_base_url.trim_end_matches('/').to_owned(),
      user_agent: format!("{}/{}", crate::CRATE_NAME, crate::CRATE_VERSION),
    }
  }

  fn get(&self, url: &str) -> AnyResult<Vec<u8>> {
    debug!("GET {}", url);
    let response = ureq::get(url)
      .header("User-Agent", &self.user_agent)
      .header("Accept", "application/vnd.github+json")
      .call()
      .with_context(|| format!("Request to {} failed", url))?;
    let mut body = response.into_body();
    let bytes = body
      .with_config()
      .limit(MAX_RESPONSE_SIZE)
      .read_to_vec()
      .with_context(|| format!("Failed to read the response from {}", url))?;
    Ok(bytes)
  }

  fn repo_url(&self, owner: &str, repo: &str, endpoint: &str) -> String {
    format!("{}/repos/{}/{}/{}", self.api_base_url, owner, repo, endpoint)
  }
}

impl ReleaseSource for GitHubClient {
  fn latest_release(&self, owner: &str, repo: &str) -> AnyResult<ReleaseInfo> {
    let bytes = self.get(&self.repo_url(owner, repo, "releases/latest"))?;
    parse_release(&bytes).with_context(|| format!("Bad latest release of {}/{}", owner, repo))
  }

  fn latest_release_with_asset(
    &self,
    owner: &str,
    repo: &str,
    keyword: &str,
  ) -> AnyResult<Option<ReleaseInfo>> {
    let bytes = self.get(&self.repo_url(owner, repo, "releases"))?;
    parse_release_with_asset(&bytes, keyword)
      .with_context(|| format!("Bad release list of {}/{}", owner, repo))
  }

  fn latest_commit(&self, owner: &str, repo: &str) -> AnyResult<Option<CommitInfo>> {
    let bytes = self.get(&self.repo_url(owner, repo, "commits"))?;
    parse_latest_commit(&bytes).with_context(|| format!("Bad commit list of {}/{}", owner, repo))
  }

  fn download(&self, url: &str) -> AnyResult<Vec<u8>> {
    let bytes = self.get(url)?;
    info!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(bytes)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use time::macros::datetime;

  #[test]
  fn test_parse_release() {
    let release = parse_release(
      br#"{"tag_name":"v17.0.1","published_at":"2024-03-01T12:00:00Z","assets":[
        {"name":"languages.json","browser_download_url":"https://x/languages.json","size":1}]}"#,
    )
    .unwrap();
    assert_eq!(release.tag, "v17.0.1");
    assert_eq!(release.published_at, datetime!(2024-03-01 12:00 UTC));
    let manifest_asset = release.find_asset("languages.json").unwrap();
    assert_eq!(manifest_asset.download_url, "https://x/languages.json");
    assert!(release.find_asset("other.zip").is_none());
  }

  #[test]
  fn test_parse_release_with_asset() {
    let body = br#"[
      {"tag_name":"v3","published_at":"2024-03-03T00:00:00Z","assets":[
        {"name":"german_EU_de.zip","browser_download_url":"u3"}]},
      {"tag_name":"v2","published_at":"2024-03-02T00:00:00Z","assets":[
        {"name":"NX_Ukrainian_FW17.zip","browser_download_url":"u2"}]},
      {"tag_name":"v1","published_at":"2024-03-01T00:00:00Z","assets":[
        {"name":"nx_ukrainian_FW16.zip","browser_download_url":"u1"}]}
    ]"#;
    let release = parse_release_with_asset(body, "ukrainian").unwrap().unwrap();
    assert_eq!(release.tag, "v2");
    assert!(parse_release_with_asset(body, "klingon").unwrap().is_none());
  }

  #[test]
  fn test_parse_latest_commit() {
    let commit = parse_latest_commit(
      br#"[{"sha":"a","commit":{"committer":{"date":"2024-02-01T00:00:00Z"}}},
           {"sha":"b","commit":{"committer":{"date":"2024-01-01T00:00:00Z"}}}]"#,
    )
    .unwrap()
    .unwrap();
    assert_eq!(commit.committer_date, datetime!(2024-02-01 0:00 UTC));
    assert_eq!(parse_latest_commit(b"[]").unwrap(), None);
    assert!(parse_latest_commit(br#"{"message":"Not Found"}"#).is_err());
  }

  #[test]
  fn test_repo_url() {
    let client = GitHubClient::new("https://api.github.com/");
    assert_eq!(
      client.repo_url("NX-Family", "NX-Translation", "releases/latest"),
      "https://api.github.com/repos/NX-Family/NX-Translation/releases/latest",
    );
  }
}
