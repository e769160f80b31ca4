//! Browser module runtime, emitted at the top of the vendors chunk.
//!
//! Chunks register their module factories by pushing
//! `[name, {id: factory}, [entry ids]]` onto `self.kilnJsonp`. The runtime
//! replaces `push` so chunks loaded later register immediately, and runs the
//! entry ids of each chunk once its factories are in place.
//!
//! Helpers available to factories as `__kiln_require.*`:
//!
//! | helper | purpose |
//! |--------|---------|
//! | `r`    | mark exports as an ES module namespace |
//! | `d`    | define export getters |
//! | `i`    | require with ES module interop (CommonJS gets a `default`) |
//! | `x`    | copy every export of another namespace (`export *`) |
//! | `e`    | load async chunks by name |

use std::collections::BTreeMap;

/// Global the chunk queue lives on.
pub const JSONP_GLOBAL: &str = "kilnJsonp";

const TEMPLATE: &str = r#"(function () {
  var modules = {};
  var cache = {};
  var chunks = {};
  var styles = {};
  var publicPath = __KILN_PUBLIC_PATH__;
  var scriptFiles = __KILN_SCRIPT_FILES__;
  var styleFiles = __KILN_STYLE_FILES__;
  var hasOwn = Object.prototype.hasOwnProperty;

  function __kiln_require(id) {
    var cached = cache[id];
    if (cached) return cached.exports;
    if (!hasOwn.call(modules, id)) throw new Error("Cannot find module '" + id + "'");
    var module = (cache[id] = { id: id, exports: {} });
    modules[id].call(module.exports, module, module.exports, __kiln_require);
    return module.exports;
  }

  __kiln_require.r = function (exports) {
    Object.defineProperty(exports, "__esModule", { value: true });
  };

  __kiln_require.d = function (exports, getters) {
    for (var key in getters) {
      if (hasOwn.call(getters, key) && !hasOwn.call(exports, key)) {
        Object.defineProperty(exports, key, { enumerable: true, get: getters[key] });
      }
    }
  };

  __kiln_require.i = function (id) {
    var exports = __kiln_require(id);
    if (exports && exports.__esModule) return exports;
    var namespace = {};
    if (exports !== null && (typeof exports === "object" || typeof exports === "function")) {
      for (var key in exports) namespace[key] = exports[key];
    }
    namespace["default"] = exports;
    return namespace;
  };

  __kiln_require.x = function (exports, from) {
    Object.keys(from).forEach(function (key) {
      if (key !== "default" && !hasOwn.call(exports, key)) {
        Object.defineProperty(exports, key, {
          enumerable: true,
          get: function () { return from[key]; }
        });
      }
    });
  };

  function inject(tag, attribute, file, name) {
    return new Promise(function (resolve, reject) {
      var element = document.createElement(tag);
      if (tag === "link") element.rel = "stylesheet";
      element[attribute] = publicPath + file;
      element.onload = resolve;
      element.onerror = function () {
        reject(new Error("Loading chunk " + name + " failed (" + file + ")"));
      };
      document.head.appendChild(element);
    });
  }

  function load(name) {
    var pending = [];
    if (hasOwn.call(styleFiles, name)) {
      if (!styles[name]) {
        styles[name] = inject("link", "href", styleFiles[name], name).catch(function (error) {
          delete styles[name];
          throw error;
        });
      }
      pending.push(styles[name]);
    }
    if (hasOwn.call(scriptFiles, name)) {
      if (!chunks[name]) {
        chunks[name] = inject("script", "src", scriptFiles[name], name).catch(function (error) {
          delete chunks[name];
          throw error;
        });
      }
      pending.push(chunks[name]);
    }
    return Promise.all(pending);
  }

  __kiln_require.e = function (names) {
    return Promise.all(names.map(load));
  };

  function register(data) {
    var name = data[0];
    var factories = data[1];
    var entries = data[2];
    for (var id in factories) {
      if (hasOwn.call(factories, id)) modules[id] = factories[id];
    }
    if (!chunks[name]) chunks[name] = Promise.resolve();
    for (var i = 0; i < entries.length; i++) __kiln_require(entries[i]);
  }

  var queue = (self.__KILN_JSONP__ = self.__KILN_JSONP__ || []);
  var early = queue.slice();
  queue.push = register;
  for (var j = 0; j < early.length; j++) register(early[j]);
})();
"#;

/// Runtime source for a build.
///
/// `scripts` and `styles` map async chunk names to their output paths.
pub fn render(
    public_path: &str,
    scripts: &BTreeMap<String, String>,
    styles: &BTreeMap<String, String>,
) -> String {
    let json = |value: &BTreeMap<String, String>| {
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    };
    TEMPLATE
        .replace("__KILN_PUBLIC_PATH__", &serde_json::Value::from(public_path).to_string())
        .replace("__KILN_SCRIPT_FILES__", &json(scripts))
        .replace("__KILN_STYLE_FILES__", &json(styles))
        .replace("__KILN_JSONP__", JSONP_GLOBAL)
}

/// Opening of a chunk's registration call, up to the factory table.
pub fn chunk_prefix(name: &str) -> String {
    format!(
        "(self.{JSONP_GLOBAL}=self.{JSONP_GLOBAL}||[]).push([{},{{",
        serde_json::Value::from(name)
    )
}
