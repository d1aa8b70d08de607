use std::fs::{self, File};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde_json::{json, Value};
use tempfile::TempDir;
use vellum_view::{
    CacheStatus, CompileError, CompilingEngine, Engine, Manager, ViewConfig, ViewError,
};

struct Fixture {
    dir: TempDir,
    manager: Manager,
}

impl Fixture {
    fn new(files: &[(&str, &str)]) -> Self {
        let dir = TempDir::new().unwrap();
        for (name, body) in files {
            write(&dir.path().join("views").join(name), body);
        }
        let config = ViewConfig::new(dir.path()).path(dir.path().join("views"));
        let manager = Manager::from_config(&config);
        Self { dir, manager }
    }

    fn cache_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("storage").join("views")
    }

    fn artifacts(&self) -> usize {
        fs::read_dir(self.cache_dir())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

fn write(path: &Path, body: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

#[test]
fn test_escaped_versus_raw_output() {
    let fx = Fixture::new(&[("show.vellum.html", "{{ $x }}|{!! $x !!}")]);
    let out = fx.manager.view("show", &json!({"x": "<b>"})).unwrap();
    assert_eq!(out, "&lt;b&gt;|<b>");
}

#[test]
fn test_layout_receives_exact_contents() {
    let fx = Fixture::new(&[
        ("page.vellum.html", "@extends('layouts.main')\nHello {{ $name }}"),
        ("layouts/main.vellum.html", "<body>{!! $contents !!}</body><i>{{ $name }}</i>"),
    ]);
    let out = fx.manager.view("page", &json!({"name": "Ada"})).unwrap();
    assert_eq!(out, "<body>\nHello Ada</body><i>Ada</i>");
}

#[test]
fn test_layout_contents_overrides_caller_variable() {
    let fx = Fixture::new(&[
        ("page.vellum.html", "@extends('shell')child"),
        ("shell.vellum.html", "[{!! $contents !!}]"),
    ]);
    let out = fx.manager.view("page", &json!({"contents": "caller"})).unwrap();
    assert_eq!(out, "[child]");
}

#[test]
fn test_nested_layouts() {
    let fx = Fixture::new(&[
        ("page.vellum.html", "@extends('inner')p"),
        ("inner.vellum.html", "@extends('outer')<i>{!! $contents !!}</i>"),
        ("outer.vellum.html", "<o>{!! $contents !!}</o>"),
    ]);
    assert_eq!(fx.manager.view("page", &()).unwrap(), "<o><i>p</i></o>");
}

#[test]
fn test_layout_from_variable() {
    let fx = Fixture::new(&[
        ("page.vellum.html", "@extends($layout)x"),
        ("a.vellum.html", "A{!! $contents !!}"),
        ("b.vellum.html", "B{!! $contents !!}"),
    ]);
    assert_eq!(fx.manager.view("page", &json!({"layout": "b"})).unwrap(), "Bx");
}

#[test]
fn test_self_extending_layout_is_bounded() {
    let fx = Fixture::new(&[("loop.vellum.html", "@extends('loop')x")]);
    let manager = fx.manager.clone().max_layout_depth(5);
    let err = manager.view("loop", &()).unwrap_err();
    assert!(matches!(err, ViewError::LayoutDepth { depth: 5, .. }), "{err}");
}

#[test]
fn test_missing_layout_is_resolution_error() {
    let fx = Fixture::new(&[("page.vellum.html", "@extends('nowhere')x")]);
    let err = fx.manager.view("page", &()).unwrap_err();
    assert!(err.is_resolution());
}

#[test]
fn test_layouts_cross_engines() {
    let fx = Fixture::new(&[
        ("page.vellum.html", "@extends('frame')<p>{{ $t }}</p>"),
        ("frame.jinja", "<div>{{ contents }}</div>"),
    ]);
    let out = fx.manager.view("page", &json!({"t": "hi"})).unwrap();
    assert_eq!(out, "<div><p>hi</p></div>");
}

#[test]
fn test_undefined_macro_via_directive_has_no_output() {
    let fx = Fixture::new(&[("m.vellum.html", "visible text @money(1) more")]);
    let err = fx.manager.view("m", &()).unwrap_err();
    assert!(matches!(err, ViewError::MacroUndefined(ref name) if name == "money"));
}

#[test]
fn test_undefined_macro_via_use_macro() {
    let manager = Manager::new();
    let err = manager.use_macro("money", &[json!(1)]).unwrap_err();
    assert!(matches!(err, ViewError::MacroUndefined(ref name) if name == "money"));
}

#[test]
fn test_macro_sees_manager() {
    let fx = Fixture::new(&[
        ("page.vellum.html", "@partial('part', $n)"),
        ("part.vellum.html", "<{{ $n }}>"),
    ]);
    let manager = fx
        .manager
        .clone()
        .add_macro("partial", |m: &Manager, args: &[Value]| {
            let name = args[0].as_str().unwrap_or_default();
            Ok(Value::String(m.view(name, &json!({"n": args[1]}))?))
        });
    assert_eq!(manager.view("page", &json!({"n": 7})).unwrap(), "&lt;7&gt;");
}

#[test]
fn test_overridden_escape_macro() {
    let fx = Fixture::new(&[("e.vellum.html", "{{ $v }}")]);
    let manager = fx
        .manager
        .clone()
        .add_macro("escape", |_: &Manager, args: &[Value]| {
            Ok(json!(args[0].to_string()))
        });
    assert_eq!(manager.view("e", &json!({"v": "<"})).unwrap(), "\"<\"");
}

#[test]
fn test_syntax_errors_name_the_file() {
    let fx = Fixture::new(&[("broken.vellum.html", "ok\n@if($x)\n")]);
    let err = fx.manager.view("broken", &()).unwrap_err();
    match err {
        ViewError::Compile(CompileError::Syntax { path, source }) => {
            assert!(path.ends_with("broken.vellum.html"));
            assert_eq!(source.line, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fx.artifacts(), 0);
}

#[test]
fn test_cache_written_once_and_reused() {
    let fx = Fixture::new(&[("home.vellum.html", "v1 {{ $n }}")]);
    assert_eq!(fx.manager.view("home", &json!({"n": 1})).unwrap(), "v1 1");
    assert_eq!(fx.artifacts(), 1);

    let engine = CompilingEngine::new(fx.cache_dir());
    let view = fx.manager.render("home", &()).unwrap();
    let artifact = engine.cache().artifact_path(view.path());
    let written = fs::metadata(&artifact).unwrap().modified().unwrap();

    let (_, status) = engine.compile_if_stale(view.path()).unwrap();
    assert_eq!(status, CacheStatus::Fresh);
    assert_eq!(fx.manager.view("home", &json!({"n": 2})).unwrap(), "v1 2");
    assert_eq!(fs::metadata(&artifact).unwrap().modified().unwrap(), written);
}

#[test]
fn test_touched_source_recompiles_once() {
    let fx = Fixture::new(&[("home.vellum.html", "v1")]);
    assert_eq!(fx.manager.view("home", &()).unwrap(), "v1");

    let view = fx.manager.render("home", &()).unwrap();
    let engine = CompilingEngine::new(fx.cache_dir());
    let artifact = engine.cache().artifact_path(view.path());

    fs::write(view.path(), "v2").unwrap();
    let hour_ago = SystemTime::now() - Duration::from_secs(3600);
    File::options()
        .write(true)
        .open(&artifact)
        .unwrap()
        .set_modified(hour_ago)
        .unwrap();

    let (_, status) = engine.compile_if_stale(view.path()).unwrap();
    assert_eq!(status, CacheStatus::Compiled);
    let (_, status) = engine.compile_if_stale(view.path()).unwrap();
    assert_eq!(status, CacheStatus::Fresh);
    assert_eq!(fx.manager.view("home", &()).unwrap(), "v2");
    assert_eq!(fx.artifacts(), 1);
}

#[test]
fn test_strict_variables_from_config() {
    let dir = TempDir::new().unwrap();
    write(&dir.path().join("views/s.vellum.html"), "{{ $nope }}");
    let mut config = ViewConfig::new(dir.path()).path(dir.path().join("views"));
    config.strict_variables = true;

    let err = Manager::from_config(&config).view("s", &()).unwrap_err();
    assert!(matches!(err, ViewError::UndefinedVariable(ref name) if name == "nope"));
}

#[test]
fn test_substitution_and_literal_engines() {
    let fx = Fixture::new(&[
        ("mail/welcome.tpl", "Hi {name}, you have {count} messages"),
        ("robots.txt", "User-agent: {name}"),
    ]);
    let data = json!({"name": "Ada", "count": 3});
    assert_eq!(
        fx.manager.view("mail.welcome", &data).unwrap(),
        "Hi Ada, you have {count} messages"
    );
    assert_eq!(fx.manager.view("robots", &data).unwrap(), "User-agent: {name}");
}

#[test]
fn test_selector_round_trip() {
    struct Named(&'static str, Arc<AtomicUsize>);

    impl Engine for Named {
        fn render(
            &self,
            _view: &vellum_view::View,
            _cx: &vellum_view::Context<'_>,
        ) -> Result<String, ViewError> {
            self.1.fetch_add(1, Ordering::SeqCst);
            Ok(self.0.to_string())
        }
    }

    let dir = TempDir::new().unwrap();
    write(&dir.path().join("layout.basic.php"), "");
    write(&dir.path().join("layout.php"), "");
    let calls = Arc::new(AtomicUsize::new(0));

    let manager = Manager::new()
        .add_path(dir.path())
        .add_engine("php", Named("php", Arc::clone(&calls)))
        .add_engine("basic.php", Named("basic.php", Arc::clone(&calls)))
        .implicit_suffix(Some("php"));

    let view = manager.render("layout.basic", &()).unwrap();
    assert_eq!(view.extension(), "basic.php");
    assert_eq!(view.render(&manager).unwrap(), "basic.php");

    let view = manager.render("layout", &()).unwrap();
    assert_eq!(view.extension(), "php");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_manager_is_shareable_across_threads() {
    let fx = Fixture::new(&[
        ("page.vellum.html", "@extends('shell'){{ $i }}"),
        ("shell.vellum.html", "<{!! $contents !!}>"),
    ]);
    let manager = Arc::new(fx.manager.clone());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let manager = Arc::clone(&manager);
            std::thread::spawn(move || manager.view("page", &json!({"i": i})).unwrap())
        })
        .collect();

    let mut outputs: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    outputs.sort();
    assert_eq!(outputs, ["<0>", "<1>", "<2>", "<3>"]);
}
