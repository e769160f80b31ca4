//! Final script minification.

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{
    CompressOptions, CompressOptionsKeepNames, MangleOptions, MangleOptionsKeepNames, Minifier,
    MinifierOptions,
};
use oxc_parser::Parser;
use oxc_span::SourceType;
use oxc_transformer::EngineTargets;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptMinifyOptions {
    pub drop_console: bool,
    pub keep_names: bool,
    /// Syntax level the compressor may not exceed
    pub target: String,
}

impl Default for ScriptMinifyOptions {
    fn default() -> Self {
        Self {
            drop_console: true,
            keep_names: true,
            target: "es2015".to_string(),
        }
    }
}

/// Compress and mangle a complete script (a chunk or an inline `<script>`).
pub fn minify_script(code: &str, options: &ScriptMinifyOptions) -> Result<String, String> {
    let allocator = Allocator::default();
    let source_type = SourceType::mjs().with_module(false);
    let ret = Parser::new(&allocator, code, source_type).parse();
    if let Some(err) = ret.errors.first() {
        return Err(err.message.to_string());
    }
    let mut program = ret.program;

    let (mangle_names, compress_names) = if options.keep_names {
        (MangleOptionsKeepNames::all_true(), CompressOptionsKeepNames::all_true())
    } else {
        (MangleOptionsKeepNames::all_false(), CompressOptionsKeepNames::all_false())
    };

    let target = EngineTargets::from_target(&options.target)
        .map_err(|e| format!("unsupported minify target '{}': {e}", options.target))?;

    let minified = Minifier::new(MinifierOptions {
        mangle: Some(MangleOptions {
            keep_names: mangle_names,
            ..MangleOptions::default()
        }),
        compress: Some(CompressOptions {
            drop_console: options.drop_console,
            keep_names: compress_names,
            target,
            ..CompressOptions::smallest()
        }),
    })
    .minify(&allocator, &mut program);

    Ok(Codegen::new()
        .with_options(CodegenOptions::minify())
        .with_scoping(minified.scoping)
        .build(&program)
        .code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_console_and_whitespace() {
        let out = minify_script(
            "function greet(name) {\n  console.log(name);\n  return 'hi ' + name;\n}\nwindow.greet = greet;\n",
            &ScriptMinifyOptions::default(),
        )
        .unwrap();
        assert!(!out.contains("console"));
        assert!(out.len() < 70);
    }

    #[test]
    fn keeps_function_and_class_names() {
        let out = minify_script(
            "(function () { function Widget() {} class Panel {} window.x = [Widget, Panel]; })();",
            &ScriptMinifyOptions::default(),
        )
        .unwrap();
        assert!(out.contains("Widget"));
        assert!(out.contains("Panel"));
    }

    #[test]
    fn console_kept_when_requested() {
        let options = ScriptMinifyOptions {
            drop_console: false,
            ..ScriptMinifyOptions::default()
        };
        assert!(minify_script("console.log(1);", &options).unwrap().contains("console"));
    }

    #[test]
    fn syntax_errors_are_reported() {
        assert!(minify_script("var = ;", &ScriptMinifyOptions::default()).is_err());
    }
}
