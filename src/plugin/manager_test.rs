// ! Tests for the plugin host

#[cfg(test)]
mod tests {
    use crate::core::error::HostError;
    use crate::plugin::api::{
        InvocationError, MethodSignature, ModuleDeclaration, PluginObject, TypeDeclaration,
    };
    use crate::plugin::loader::{LoadedModule, ModuleOpener};
    use crate::plugin::test_support::{MemoryOpener, counter_module, greet, greeter_module};
    use crate::plugin::{HostEvent, HostSettings, PluginHost, PluginResult};
    use crate::protocol::param_type::ParamType;
    use crate::protocol::types::{InvokeRequest, ParameterDescriptor};
    use serde_json::{Value, json};
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    struct Sleeper;

    impl PluginObject for Sleeper {
        fn invoke(
            &mut self,
            method: &str,
            _args: Vec<Value>,
        ) -> Result<Option<Value>, InvocationError> {
            match method {
                "Nap" => {
                    std::thread::sleep(Duration::from_millis(1500));
                    Ok(None)
                }
                "Panic" => panic!("sleeper fell out of bed"),
                _ => Err(InvocationError::unknown_method(method)),
            }
        }
    }

    fn sleeper_module() -> ModuleDeclaration {
        ModuleDeclaration::new("Sleeper", "0.1.0")
            .with_type(
                TypeDeclaration::interface("sleeper::ISleeper")
                    .method(MethodSignature::new("Nap"))
                    .method(MethodSignature::new("Panic")),
            )
            .with_type(
                TypeDeclaration::concrete("sleeper::Sleeper", || Sleeper)
                    .implements("sleeper::ISleeper"),
            )
    }

    /// Panics on every open while armed
    struct ExplodingOpener {
        inner: MemoryOpener,
        armed: AtomicBool,
    }

    impl ModuleOpener for ExplodingOpener {
        fn open(&self, path: &Path) -> PluginResult<LoadedModule> {
            if self.armed.load(Ordering::SeqCst) {
                panic!("opener blew up on {}", path.display());
            }
            self.inner.open(path)
        }
    }

    /// Signals `entered` and blocks until `release` fires before each open
    struct GateOpener {
        inner: MemoryOpener,
        entered: mpsc::UnboundedSender<()>,
        release: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl ModuleOpener for GateOpener {
        fn open(&self, path: &Path) -> PluginResult<LoadedModule> {
            let _ = self.entered.send(());
            let _ = self.release.lock().unwrap().recv();
            self.inner.open(path)
        }
    }

    fn plugin_dir(files: &[&str]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            std::fs::write(dir.path().join(file), b"").unwrap();
        }
        dir
    }

    fn settings(dir: &Path) -> HostSettings {
        HostSettings::default()
            .with_plugin_folder(dir)
            .with_extensions(["so"])
    }

    fn host_with(settings: HostSettings, opener: MemoryOpener) -> PluginHost {
        PluginHost::with_opener(settings, Arc::new(opener))
    }

    fn greeter_host(dir: &Path) -> PluginHost {
        host_with(
            settings(dir),
            MemoryOpener::new().with_module("libgreeter", greeter_module),
        )
    }

    fn name_arg(value: &str) -> Vec<ParameterDescriptor> {
        vec![ParameterDescriptor::argument("name", "String", json!(value))]
    }

    async fn record_events(host: &PluginHost) -> Arc<Mutex<Vec<HostEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        host.on_event(move |event| sink.lock().unwrap().push(event)).await;
        events
    }

    #[tokio::test]
    async fn test_missing_directory_is_a_noop() {
        let dir = plugin_dir(&["libgreeter.so"]);
        let host = greeter_host(dir.path());

        let report = host.configure_from(dir.path().join("missing")).await.unwrap();
        assert!(!report.scanned);
        assert_eq!(report.generation, 0);
        assert!(host.list_modules().await.is_empty());

        host.configure().await.unwrap();
        let report = host.configure_from(dir.path().join("missing")).await.unwrap();
        assert!(!report.scanned);
        assert_eq!(report.generation, 1);
        assert_eq!(host.list_modules().await, vec!["Greeter"]);
    }

    #[tokio::test]
    async fn test_list_modules_reports_every_module() {
        let dir = plugin_dir(&["libzeta.so", "libalpha.so", "notes.txt"]);
        let opener = MemoryOpener::new()
            .with_module("libzeta", || {
                counter_module("Zeta", "zeta::ICounter", &["zeta::Counter"])
            })
            .with_module("libalpha", || {
                counter_module("Alpha", "alpha::ICounter", &["alpha::Counter"])
            });
        let host = host_with(settings(dir.path()), opener);

        let report = host.configure().await.unwrap();
        assert!(report.scanned);
        assert_eq!(report.bindings, 2);

        let mut names = host.list_modules().await;
        names.sort();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
        assert_eq!(host.loaded_modules().await.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_module_is_skipped() {
        let dir = plugin_dir(&["libbroken.so", "libgreeter.so"]);
        let host = greeter_host(dir.path());
        let events = record_events(&host).await;

        let report = host.configure().await.unwrap();
        assert_eq!(report.loaded, vec!["Greeter"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, dir.path().join("libbroken.so"));

        let events = events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            HostEvent::ModuleFailed { path, .. } if path.ends_with("libbroken.so")
        )));
    }

    #[tokio::test]
    async fn test_greeter_scenario() {
        let dir = plugin_dir(&["libgreeter.so"]);
        let host = greeter_host(dir.path());
        host.configure().await.unwrap();

        assert_eq!(host.list_modules().await, vec!["Greeter"]);

        let described = host.list_methods("Greeter").await.unwrap();
        let greet_method = described
            .last()
            .and_then(|d| d.find_type("greeter::IGreeter"))
            .and_then(|t| t.find_method("Greet"))
            .unwrap();
        assert_eq!(
            greet_method.parameters,
            vec![ParameterDescriptor::declared("name", &ParamType::String)]
        );

        let args = name_arg("Ada");
        let result = host
            .invoke("Greeter", "greeter::Greeter", "Greet", Some(args.as_slice()))
            .await
            .unwrap();
        assert_eq!(result, Some(json!(greet("Ada"))));

        // By path and through the interface
        let location = dir.path().join("libgreeter.so");
        let result = host
            .invoke(
                &location.display().to_string(),
                "greeter::IGreeter",
                "Greet",
                Some(args.as_slice()),
            )
            .await
            .unwrap();
        assert_eq!(result, Some(json!("Hello, Ada!")));
    }

    #[tokio::test]
    async fn test_list_methods_by_name() {
        let dir = plugin_dir(&["libgreeter.so"]);
        let host = greeter_host(dir.path());
        host.configure().await.unwrap();

        assert_eq!(host.list_methods("GREETER").await.unwrap().len(), 1);
        assert_eq!(
            host.list_methods("Nope").await.unwrap_err(),
            HostError::ModuleNotFound("Nope".to_string())
        );
    }

    #[tokio::test]
    async fn test_resolution_errors() {
        let dir = plugin_dir(&["libgreeter.so"]);
        let host = greeter_host(dir.path());
        host.configure().await.unwrap();

        let err = host.invoke("Greeter", "greeter::Nope", "Greet", None).await.unwrap_err();
        assert!(matches!(err, HostError::TypeNotFound(_)));

        let err = host.invoke("Greeter", "greeter::Greeter", "Shout", None).await.unwrap_err();
        assert!(matches!(err, HostError::MethodNotFound { .. }));

        let err = host.invoke("Nope", "greeter::Greeter", "Greet", None).await.unwrap_err();
        assert_eq!(err, HostError::ModuleNotFound("Nope".to_string()));

        let err = host
            .invoke("/nowhere/libmissing.so", "greeter::Greeter", "Greet", None)
            .await
            .unwrap_err();
        assert_eq!(err.stage(), "loading");

        let err = host.invoke("Greeter", "greeter::Unbound", "Greet", None).await.unwrap_err();
        assert_eq!(
            err,
            HostError::InstanceUnavailable("greeter::Unbound".to_string())
        );

        let err = host.invoke("Greeter", "greeter::Greeter", "Fail", None).await.unwrap_err();
        assert_eq!(err, HostError::Invocation("greeter is out of words".to_string()));
    }

    #[tokio::test]
    async fn test_module_outside_generation_is_opened_fresh() {
        let plugins = plugin_dir(&["libgreeter.so"]);
        let elsewhere = plugin_dir(&["libgreeter.so"]);
        let opener = Arc::new(MemoryOpener::new().with_module("libgreeter", greeter_module));
        let host = PluginHost::with_opener(settings(plugins.path()), opener.clone());
        host.configure().await.unwrap();
        assert_eq!(opener.opened(), 1);

        let args = name_arg("Grace");
        let outside = elsewhere.path().join("libgreeter.so");
        let result = host
            .invoke(
                &outside.display().to_string(),
                "greeter::Greeter",
                "Greet",
                Some(args.as_slice()),
            )
            .await
            .unwrap();
        assert_eq!(result, Some(json!("Hello, Grace!")));
        assert_eq!(opener.opened(), 2);

        // Modules of the current generation are reused
        host.invoke("Greeter", "greeter::Greeter", "Greet", Some(args.as_slice()))
            .await
            .unwrap();
        assert_eq!(opener.opened(), 2);
    }

    #[tokio::test]
    async fn test_generation_is_replaced_on_rescan() {
        let dir = plugin_dir(&["libgreeter.so"]);
        let host = greeter_host(dir.path());
        let events = record_events(&host).await;

        host.configure().await.unwrap();
        std::fs::remove_file(dir.path().join("libgreeter.so")).unwrap();
        let report = host.configure().await.unwrap();

        assert_eq!(report.generation, 2);
        assert_eq!(host.generation().await, 2);
        assert!(host.list_modules().await.is_empty());
        assert!(matches!(
            host.list_methods("Greeter").await,
            Err(HostError::ModuleNotFound(_))
        ));

        let events = events.lock().unwrap();
        assert_eq!(
            events.iter().filter(|e| matches!(e, HostEvent::Configured { .. })).count(),
            2
        );
        assert!(events.contains(&HostEvent::GenerationReleased { generation: 1 }));
        assert!(events.contains(&HostEvent::InterfaceBound {
            interface: "greeter::IGreeter".to_string(),
            implementation: "greeter::Greeter".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_failed_scan_leaves_an_empty_generation() {
        let dir = plugin_dir(&["libgreeter.so"]);
        let opener = Arc::new(ExplodingOpener {
            inner: MemoryOpener::new().with_module("libgreeter", greeter_module),
            armed: AtomicBool::new(false),
        });
        let host = PluginHost::with_opener(settings(dir.path()), opener.clone());
        let events = record_events(&host).await;

        host.configure().await.unwrap();
        assert_eq!(host.list_modules().await, vec!["Greeter"]);

        opener.armed.store(true, Ordering::SeqCst);
        let err = host.configure().await.unwrap_err();
        assert!(matches!(err, HostError::Internal(_)));

        // The old generation was released and replaced, not left half-taken
        assert_eq!(host.generation().await, 2);
        assert!(host.list_modules().await.is_empty());
        assert_eq!(
            host.invoke("Greeter", "greeter::Greeter", "Greet", None).await.unwrap_err(),
            HostError::ModuleNotFound("Greeter".to_string())
        );
        assert!(
            events
                .lock()
                .unwrap()
                .contains(&HostEvent::GenerationReleased { generation: 1 })
        );

        opener.armed.store(false, Ordering::SeqCst);
        let report = host.configure().await.unwrap();
        assert_eq!(report.generation, 3);
        assert_eq!(host.list_modules().await, vec!["Greeter"]);
        assert!(
            events
                .lock()
                .unwrap()
                .contains(&HostEvent::GenerationReleased { generation: 2 })
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_configure_is_serialized_with_calls() {
        let dir = plugin_dir(&["libgreeter.so"]);
        let (entered_tx, mut entered_rx) = mpsc::unbounded_channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let opener = GateOpener {
            inner: MemoryOpener::new().with_module("libgreeter", greeter_module),
            entered: entered_tx,
            release: Mutex::new(release_rx),
        };
        let host = Arc::new(PluginHost::with_opener(
            settings(dir.path()),
            Arc::new(opener),
        ));

        let configuring = tokio::spawn({
            let host = host.clone();
            async move { host.configure().await }
        });
        // The scan is now parked inside the opener
        entered_rx.recv().await.unwrap();

        let invoking = tokio::spawn({
            let host = host.clone();
            async move {
                let args = name_arg("Ada");
                host.invoke("Greeter", "greeter::Greeter", "Greet", Some(args.as_slice()))
                    .await
            }
        });
        let listing = tokio::spawn({
            let host = host.clone();
            async move { host.list_methods("Greeter").await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!configuring.is_finished());
        assert!(!invoking.is_finished());
        assert!(!listing.is_finished());

        release_tx.send(()).unwrap();
        let report = configuring.await.unwrap().unwrap();
        assert_eq!(report.generation, 1);

        // Both calls waited for the scan and saw the new generation
        assert_eq!(invoking.await.unwrap().unwrap(), Some(json!("Hello, Ada!")));
        assert_eq!(listing.await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_shared_interface_binds_once() {
        let dir = plugin_dir(&["liba.so", "libb.so"]);
        let opener = MemoryOpener::new()
            .with_module("liba", || counter_module("A", "shared::ICounter", &["a::Counter"]))
            .with_module("libb", || counter_module("B", "shared::ICounter", &["b::Counter"]));
        let host = host_with(settings(dir.path()), opener);

        let report = host.configure().await.unwrap();
        assert_eq!(report.loaded, vec!["A", "B"]);
        assert_eq!(report.bindings, 1);

        assert_eq!(
            host.invoke("B", "b::Counter", "Increment", None).await.unwrap_err(),
            HostError::InstanceUnavailable("b::Counter".to_string())
        );
        assert_eq!(
            host.invoke("A", "a::Counter", "Increment", None).await.unwrap(),
            Some(json!(1))
        );
    }

    #[tokio::test]
    async fn test_strict_arity_setting() {
        let dir = plugin_dir(&["libgreeter.so"]);
        let args = vec![ParameterDescriptor::argument("first", "String", json!("a"))];

        let lenient = greeter_host(dir.path());
        lenient.configure().await.unwrap();
        assert_eq!(
            lenient
                .invoke("Greeter", "greeter::Greeter", "Pair", Some(args.as_slice()))
                .await
                .unwrap(),
            Some(json!(["a"]))
        );

        let strict = host_with(
            settings(dir.path()).with_strict_arity(),
            MemoryOpener::new().with_module("libgreeter", greeter_module),
        );
        strict.configure().await.unwrap();
        let err = strict
            .invoke("Greeter", "greeter::Greeter", "Pair", Some(args.as_slice()))
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::ArityMismatch { expected: 2, bound: 1, .. }));
    }

    #[tokio::test]
    async fn test_execute_configures_then_invokes() {
        let dir = plugin_dir(&["libgreeter.so"]);
        let host = greeter_host(dir.path());

        let request: InvokeRequest = serde_json::from_value(json!({
            "assemblyName": "Greeter",
            "typeName": "greeter::IGreeter",
            "methodName": "Greet",
            "parameters": [{"name": "name", "type": "String", "value": "Linus"}]
        }))
        .unwrap();

        assert_eq!(host.execute(&request).await.unwrap(), Some(json!("Hello, Linus!")));
        assert_eq!(host.generation().await, 1);
    }

    #[tokio::test]
    async fn test_invoke_timeout() {
        let dir = plugin_dir(&["libsleeper.so"]);
        let host = host_with(
            settings(dir.path()).with_invoke_timeout(Duration::from_millis(300)),
            MemoryOpener::new().with_module("libsleeper", sleeper_module),
        );
        host.configure().await.unwrap();

        let started = std::time::Instant::now();
        let err = host.invoke("Sleeper", "sleeper::ISleeper", "Nap", None).await.unwrap_err();
        assert!(matches!(err, HostError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_panicking_method_is_an_invocation_failure() {
        let dir = plugin_dir(&["libsleeper.so"]);
        let host = host_with(
            settings(dir.path()),
            MemoryOpener::new().with_module("libsleeper", sleeper_module),
        );
        host.configure().await.unwrap();

        let err = host.invoke("Sleeper", "sleeper::Sleeper", "Panic", None).await.unwrap_err();
        assert_eq!(err.stage(), "invocation");
    }
}
