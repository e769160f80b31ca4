//! Offline-cache service worker.
//!
//! The worker precaches every published artifact except excluded ones. An
//! entry whose URL matches the cache-bust pattern is already fingerprinted
//! and carries no revision; any other entry is revisioned by its content
//! hash and fetched with a `_kiln_rev` query parameter, so a changed file
//! never hits a stale HTTP cache.

use regex::Regex;
use serde::Serialize;

use kiln_config::KilnConfig;

use crate::hash::content_hash;
use crate::output::Artifact;
use crate::script::{ScriptMinifyOptions, minify_script};
use crate::{Error, Result};

/// One `[url, revision]` pair of the precache list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PrecacheEntry {
    pub url: String,
    pub revision: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServiceWorkerOptions {
    pub filename: String,
    pub manifest_filename: String,
    pub cache_id: String,
    pub public_path: String,
    pub navigate_fallback: String,
    pub navigate_fallback_denylist: Vec<String>,
    pub dont_cache_bust: Regex,
    pub exclude: Vec<Regex>,
    pub minify: bool,
}

impl ServiceWorkerOptions {
    pub fn new(config: &KilnConfig) -> Result<Self> {
        let sw = &config.service_worker;
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                Error::InvalidConfig(format!("service worker pattern '{pattern}': {e}"))
            })
        };
        // denylist patterns are compiled by the browser; check them here anyway
        for pattern in &sw.navigate_fallback_denylist {
            compile(pattern)?;
        }
        Ok(Self {
            filename: sw.filename.clone(),
            manifest_filename: config.manifest.filename.clone(),
            cache_id: sw.cache_id.clone(),
            public_path: config.public_path(),
            navigate_fallback: sw
                .navigate_fallback
                .clone()
                .unwrap_or_else(|| format!("{}/index.html", config.public_url())),
            navigate_fallback_denylist: sw.navigate_fallback_denylist.clone(),
            dont_cache_bust: compile(&sw.dont_cache_bust)?,
            exclude: sw.exclude.iter().map(|p| compile(p)).collect::<Result<_>>()?,
            minify: config.minify.enabled,
        })
    }

    fn is_excluded(&self, path: &str) -> bool {
        path == self.filename
            || path == self.manifest_filename
            || self.exclude.iter().any(|re| re.is_match(path))
    }
}

/// Precache list for the given artifacts, sorted by URL, one entry per URL.
pub fn precache_entries<'a>(
    artifacts: impl IntoIterator<Item = &'a Artifact>,
    options: &ServiceWorkerOptions,
) -> Vec<PrecacheEntry> {
    let mut entries: Vec<PrecacheEntry> = artifacts
        .into_iter()
        .filter(|artifact| !options.is_excluded(&artifact.path))
        .map(|artifact| {
            let url = format!("{}{}", options.public_path, artifact.path);
            let revision = (!options.dont_cache_bust.is_match(&url))
                .then(|| content_hash(&artifact.content));
            PrecacheEntry { url, revision }
        })
        .collect();
    entries.sort();
    entries.dedup_by(|a, b| a.url == b.url);
    entries
}

const TEMPLATE: &str = r#""use strict";
var precacheConfig = __KILN_PRECACHE__;
var cacheName = "kiln-precache-" + __KILN_CACHE_ID__ + "-" + (self.registration ? self.registration.scope : "");
var navigateFallback = __KILN_FALLBACK__;
var fallbackDenylist = __KILN_DENYLIST__.map(function (source) { return new RegExp(source); });

function cacheKeyFor(entry) {
  var url = new URL(entry[0], self.location);
  if (entry[1]) url.searchParams.set("_kiln_rev", entry[1]);
  return url.toString();
}

var urlsToCacheKeys = new Map(precacheConfig.map(function (entry) {
  return [new URL(entry[0], self.location).toString(), cacheKeyFor(entry)];
}));

self.addEventListener("install", function (event) {
  event.waitUntil(
    caches.open(cacheName).then(function (cache) {
      return cache.keys().then(function (requests) {
        var cached = new Set(requests.map(function (request) { return request.url; }));
        return Promise.all(Array.from(urlsToCacheKeys.values()).map(function (key) {
          if (cached.has(key)) return undefined;
          var request = new Request(key, { credentials: "same-origin" });
          return fetch(request).then(function (response) {
            if (!response.ok) throw new Error("Request for " + key + " returned status " + response.status);
            return cache.put(key, response);
          });
        }));
      });
    }).then(function () { return self.skipWaiting(); })
  );
});

self.addEventListener("activate", function (event) {
  var expected = new Set(urlsToCacheKeys.values());
  event.waitUntil(
    caches.open(cacheName).then(function (cache) {
      return cache.keys().then(function (requests) {
        return Promise.all(requests.map(function (request) {
          if (!expected.has(request.url)) return cache.delete(request);
          return undefined;
        }));
      });
    }).then(function () { return self.clients.claim(); })
  );
});

self.addEventListener("fetch", function (event) {
  if (event.request.method !== "GET") return;
  var url = new URL(event.request.url);
  url.hash = "";
  var key = urlsToCacheKeys.get(url.toString());
  if (!key && navigateFallback && event.request.mode === "navigate") {
    var denied = fallbackDenylist.some(function (pattern) { return pattern.test(url.pathname); });
    if (!denied) key = urlsToCacheKeys.get(new URL(navigateFallback, self.location).toString());
  }
  if (!key) return;
  event.respondWith(
    caches.open(cacheName).then(function (cache) {
      return cache.match(key).then(function (response) {
        return response || fetch(event.request);
      });
    }).catch(function () { return fetch(event.request); })
  );
});
"#;

/// Service worker source for `entries`.
pub fn render(entries: &[PrecacheEntry], options: &ServiceWorkerOptions) -> Result<String> {
    let precache: Vec<(&str, Option<&str>)> = entries
        .iter()
        .map(|entry| (entry.url.as_str(), entry.revision.as_deref()))
        .collect();
    let json = |value: serde_json::Result<String>| {
        value.map_err(|e| Error::Transform {
            file: options.filename.clone(),
            message: e.to_string(),
        })
    };

    let source = TEMPLATE
        .replace("__KILN_PRECACHE__", &json(serde_json::to_string(&precache))?)
        .replace("__KILN_CACHE_ID__", &json(serde_json::to_string(&options.cache_id))?)
        .replace("__KILN_FALLBACK__", &json(serde_json::to_string(&options.navigate_fallback))?)
        .replace(
            "__KILN_DENYLIST__",
            &json(serde_json::to_string(&options.navigate_fallback_denylist))?,
        );

    if !options.minify {
        return Ok(source);
    }
    let minify = ScriptMinifyOptions {
        drop_console: false,
        ..ScriptMinifyOptions::default()
    };
    minify_script(&source, &minify).map_err(|message| Error::Transform {
        file: options.filename.clone(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ArtifactKind;

    fn artifact(path: &str) -> Artifact {
        Artifact::new(path, None, ArtifactKind::Copied, path.as_bytes().to_vec())
    }

    fn options() -> ServiceWorkerOptions {
        let mut config = KilnConfig::with_root("/app");
        config.minify.enabled = false;
        ServiceWorkerOptions::new(&config).unwrap()
    }

    #[test]
    fn excludes_manifest_worker_and_maps() {
        let artifacts = [
            artifact("asset-manifest.json"),
            artifact("service-worker.js"),
            artifact("static/js/index.0123abcd.js"),
            artifact("static/js/index.0123abcd.js.map"),
            artifact("index.html"),
        ];
        let entries = precache_entries(&artifacts, &options());
        let urls: Vec<&str> = entries.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, ["/index.html", "/static/js/index.0123abcd.js"]);
    }

    #[test]
    fn fingerprinted_files_carry_no_revision() {
        let artifacts = [artifact("static/css/index.89abcdef.css"), artifact("index.html")];
        let entries = precache_entries(&artifacts, &options());
        assert_eq!(entries[0].url, "/index.html");
        assert_eq!(entries[0].revision.as_deref(), Some(content_hash(b"index.html").as_str()));
        assert_eq!(entries[1].revision, None);
    }

    #[test]
    fn listed_once() {
        let artifacts = [artifact("index.html"), artifact("index.html")];
        assert_eq!(precache_entries(&artifacts, &options()).len(), 1);
    }

    #[test]
    fn fallback_defaults_to_public_url() {
        let mut config = KilnConfig::with_root("/app");
        config.public_path = "https://cdn.example.com/app/".to_string();
        let options = ServiceWorkerOptions::new(&config).unwrap();
        assert_eq!(options.navigate_fallback, "https://cdn.example.com/app/index.html");

        let source = render(&[], &ServiceWorkerOptions { minify: false, ..options }).unwrap();
        assert!(source.contains(r#"var navigateFallback = "https://cdn.example.com/app/index.html";"#));
        assert!(source.contains(r#"var fallbackDenylist = ["^/__"]"#));
        assert!(!source.contains("__KILN_"));
    }

    #[test]
    fn renders_precache_config() {
        let entries = vec![
            PrecacheEntry {
                url: "/index.html".into(),
                revision: Some("abc".into()),
            },
            PrecacheEntry {
                url: "/static/js/index.0123abcd.js".into(),
                revision: None,
            },
        ];
        let source = render(&entries, &options()).unwrap();
        assert!(source.contains(
            r#"var precacheConfig = [["/index.html","abc"],["/static/js/index.0123abcd.js",null]];"#
        ));
    }

    #[test]
    fn minified_worker_is_smaller() {
        let mut config = KilnConfig::with_root("/app");
        config.minify.enabled = true;
        let options = ServiceWorkerOptions::new(&config).unwrap();
        let minified = render(&[], &options).unwrap();
        let plain = render(&[], &ServiceWorkerOptions { minify: false, ..options }).unwrap();
        assert!(minified.len() < plain.len());
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let mut config = KilnConfig::with_root("/app");
        config.service_worker.exclude = vec!["(".to_string()];
        assert!(matches!(
            ServiceWorkerOptions::new(&config),
            Err(Error::InvalidConfig(_))
        ));
    }
}
