//! Composition and resolution semantics, exercised through the app host.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use spindle::{App, Error, Group, GroupKey, Module};

#[derive(Debug)]
struct Clock {
    label: &'static str,
}

#[derive(Debug)]
struct Metrics;

#[derive(Debug)]
struct Server {
    clock_label: &'static str,
    label: String,
}

#[test]
fn duplicate_public_binding_is_rejected() {
    let err = App::builder("demo", "0.1.0")
        .module(Module::new("core").public(|| Ok(Clock { label: "core" })))
        .module(Module::new("web").public(|| Ok(Clock { label: "web" })))
        .build()
        .map(|_| ())
        .unwrap_err();
    assert!(err.is_build_error());
    match err {
        Error::DuplicateBinding {
            existing,
            duplicate,
            ..
        } => {
            assert_eq!(existing, "core");
            assert_eq!(duplicate, "web");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_dependency_names_the_requiring_chain() {
    let app = App::builder("demo", "0.1.0")
        .module(Module::new("web").public(|clock: Arc<Clock>| {
            Ok(Server {
                clock_label: clock.label,
                label: String::new(),
            })
        }))
        .build()
        .unwrap();

    let err = app.resolve::<Server>().unwrap_err();
    match err {
        Error::UnresolvedDependency { dependency, chain } => {
            assert!(dependency.contains("Clock"), "dependency was {dependency}");
            assert!(chain.contains("Server"), "chain was {chain}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn optional_dependency_resolves_to_none_without_a_binding() {
    let app = App::builder("demo", "0.1.0")
        .module(
            Module::new("web").public(|metrics: Option<Arc<Metrics>>| {
                Ok(Server {
                    clock_label: if metrics.is_some() { "metered" } else { "bare" },
                    label: String::new(),
                })
            }),
        )
        .build()
        .unwrap();

    let server = app.resolve::<Server>().unwrap();
    assert_eq!(server.clock_label, "bare");
}

#[test]
fn singleton_is_constructed_once_and_shared() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&builds);
    let app = App::builder("demo", "0.1.0")
        .module(Module::new("core").public(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Clock { label: "sys" })
        }))
        .build()
        .unwrap();

    let first = app.resolve::<Clock>().unwrap();
    let second = app.resolve::<Clock>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn concurrent_first_resolutions_build_once() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&builds);
    let app = App::builder("demo", "0.1.0")
        .module(Module::new("core").public(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            // Hold the slot long enough for the other threads to pile up.
            std::thread::sleep(Duration::from_millis(50));
            Ok(Clock { label: "shared" })
        }))
        .build()
        .unwrap();

    let resolved: Vec<Arc<Clock>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| app.resolve::<Clock>().unwrap()))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    assert_eq!(builds.load(Ordering::SeqCst), 1);
    for clock in &resolved[1..] {
        assert!(Arc::ptr_eq(&resolved[0], clock));
    }
}

#[test]
fn factory_failure_surfaces_with_the_produced_type() {
    let app = App::builder("demo", "0.1.0")
        .module(Module::new("core").public(|| -> spindle::Result<Clock> {
            Err(Error::factory::<Clock>("clock hardware missing"))
        }))
        .build()
        .unwrap();

    let err = app.resolve::<Clock>().unwrap_err();
    match err {
        Error::Factory { type_name, message } => {
            assert!(type_name.contains("Clock"), "type_name was {type_name}");
            assert_eq!(message, "clock hardware missing");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[derive(Debug)]
struct Left;

#[derive(Debug)]
struct Right;

#[test]
fn dependency_cycle_is_detected_with_full_chain() {
    let app = App::builder("demo", "0.1.0")
        .module(
            Module::new("tangled")
                .public(|_right: Arc<Right>| Ok(Left))
                .public(|_left: Arc<Left>| Ok(Right)),
        )
        .build()
        .unwrap();

    let err = app.resolve::<Left>().unwrap_err();
    match err {
        Error::CyclicDependency { chain } => {
            assert!(chain.contains("Left"), "chain was {chain}");
            assert!(chain.contains("Right"), "chain was {chain}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn named_bindings_of_one_type_coexist() {
    let app = App::builder("demo", "0.1.0")
        .module(
            Module::new("time")
                .public_named("wall", || Ok(Clock { label: "wall" }))
                .public_named("mono", || Ok(Clock { label: "mono" })),
        )
        .build()
        .unwrap();

    assert_eq!(
        app.container().resolve_named::<Clock>("wall").unwrap().label,
        "wall"
    );
    assert_eq!(
        app.container().resolve_named::<Clock>("mono").unwrap().label,
        "mono"
    );
    assert!(app.resolve::<Clock>().is_err());
}

struct Route {
    path: &'static str,
}

struct Routes;

impl GroupKey for Routes {
    type Value = Route;
    const NAME: &'static str = "http.routes";
}

struct Router {
    paths: Vec<&'static str>,
}

#[test]
fn group_members_arrive_in_registration_order() {
    let app = App::builder("demo", "0.1.0")
        .module(
            Module::new("web")
                .public_grouped("http.routes", || Ok(Route { path: "/health" }))
                .public_grouped("http.routes", || Ok(Route { path: "/metrics" }))
                .public_grouped("http.routes", || Ok(Route { path: "/debug" }))
                .public(|routes: Group<Routes>| {
                    Ok(Router {
                        paths: routes.0.iter().map(|r| r.path).collect(),
                    })
                }),
        )
        .build()
        .unwrap();

    let router = app.resolve::<Router>().unwrap();
    assert_eq!(router.paths, vec!["/health", "/metrics", "/debug"]);

    let empty = app.container().resolve_group::<Route>("no.such.group").unwrap();
    assert!(empty.is_empty());
}

#[test]
fn private_binding_shadows_public_inside_its_module() {
    let app = App::builder("demo", "0.1.0")
        .module(Module::new("core").public(|| Ok(Clock { label: "public" })))
        .module(
            Module::new("web")
                .private(|| Ok(Clock { label: "private" }))
                .public(|clock: Arc<Clock>| {
                    Ok(Server {
                        clock_label: clock.label,
                        label: String::new(),
                    })
                }),
        )
        .build()
        .unwrap();

    let server = app.resolve::<Server>().unwrap();
    assert_eq!(server.clock_label, "private");
    // From outside the module only the public binding is visible.
    assert_eq!(app.resolve::<Clock>().unwrap().label, "public");
}

#[test]
fn decorators_run_in_registration_order_before_caching() {
    let runs = Arc::new(AtomicUsize::new(0));
    let first_runs = Arc::clone(&runs);
    let second_runs = Arc::clone(&runs);
    let app = App::builder("demo", "0.1.0")
        .module(
            Module::new("web")
                .public(|| {
                    Ok(Server {
                        clock_label: "sys",
                        label: "base".to_string(),
                    })
                })
                .decorate(move |server: Arc<Server>| {
                    first_runs.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(Server {
                        clock_label: server.clock_label,
                        label: format!("{}+first", server.label),
                    }))
                })
                .decorate(move |server: Arc<Server>| {
                    second_runs.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(Server {
                        clock_label: server.clock_label,
                        label: format!("{}+second", server.label),
                    }))
                }),
        )
        .build()
        .unwrap();

    let server = app.resolve::<Server>().unwrap();
    assert_eq!(server.label, "base+first+second");

    // The decorated instance is what got cached; decorators never rerun.
    let again = app.resolve::<Server>().unwrap();
    assert!(Arc::ptr_eq(&server, &again));
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn params_struct_hydrates_pub_fields_and_defaults_the_rest() {
    spindle::params! {
        pub struct ServerDeps {
            pub clock: Arc<Clock>,
            pub metrics: Option<Arc<Metrics>>,
            retries: u32,
        }
    }

    let app = App::builder("demo", "0.1.0")
        .module(
            Module::new("web")
                .public(|| Ok(Clock { label: "sys" }))
                .public(|deps: ServerDeps| {
                    assert_eq!(deps.retries, 0);
                    Ok(Server {
                        clock_label: deps.clock.label,
                        label: if deps.metrics.is_some() {
                            "metered".to_string()
                        } else {
                            "bare".to_string()
                        },
                    })
                }),
        )
        .build()
        .unwrap();

    let server = app.resolve::<Server>().unwrap();
    assert_eq!(server.clock_label, "sys");
    assert_eq!(server.label, "bare");
}

#[test]
fn params_aggregate_without_resolvable_fields_hydrates_from_nothing() {
    spindle::params! {
        pub struct BareDeps {
            attempts: u8,
        }
    }

    let app = App::builder("demo", "0.1.0")
        .module(Module::new("core").public(|deps: BareDeps| {
            Ok(Clock {
                label: if deps.attempts == 0 { "fresh" } else { "retried" },
            })
        }))
        .build()
        .unwrap();

    assert_eq!(app.resolve::<Clock>().unwrap().label, "fresh");
}

#[test]
fn supplied_instance_is_resolvable() {
    let app = App::builder("demo", "0.1.0")
        .module(Module::new("core").supply(Clock { label: "supplied" }))
        .build()
        .unwrap();

    assert_eq!(app.resolve::<Clock>().unwrap().label, "supplied");
}

#[test]
fn invokers_run_eagerly_during_composition() {
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran);
    let _app = App::builder("demo", "0.1.0")
        .module(
            Module::new("core")
                .supply(Clock { label: "sys" })
                .invoke(move |clock: Arc<Clock>| {
                    assert_eq!(clock.label, "sys");
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
        )
        .build()
        .unwrap();

    // No resolve() happened; the invoker still ran at build time.
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

#[test]
fn invoker_failure_aborts_composition() {
    let err = App::builder("demo", "0.1.0")
        .module(Module::new("web").invoke(|_server: Arc<Server>| Ok(())))
        .build()
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, Error::UnresolvedDependency { .. }));
}

#[test]
fn submodule_bindings_join_the_shared_graph() {
    let app = App::builder("demo", "0.1.0")
        .module(
            Module::new("root").submodule(
                Module::new("time").public(|| Ok(Clock { label: "nested" })),
            ),
        )
        .build()
        .unwrap();

    assert_eq!(app.resolve::<Clock>().unwrap().label, "nested");
}

#[test]
fn manifest_is_seeded_into_the_graph() {
    let app = App::builder("demo", "1.2.3")
        .build()
        .unwrap();

    let manifest = app.resolve::<spindle::Manifest>().unwrap();
    assert_eq!(manifest.application, "demo");
    assert_eq!(manifest.version.to_string(), "1.2.3");
}

#[test]
fn invalid_version_fails_composition() {
    let err = App::builder("demo", "not-semver")
        .build()
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidManifest { .. }));
}
