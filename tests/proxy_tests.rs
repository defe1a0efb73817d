//! Proxy round trips against an in-process child and the real
//! `plugspace-proxy` binary.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use plugspace::proxy::Callback;
use plugspace::{
    Module, PluginProxy, ProxyChild, ProxyError, ProxyState, StaticImporter,
};
use serde_json::{Map, Value, json};
use tempfile::TempDir;
use tokio::process::Command;

/// Polls `handle_responses` until `expected` callbacks ran or about a
/// second passed.
async fn drain(proxy: &mut PluginProxy, expected: usize) -> usize {
    let mut invoked = 0;
    for _ in 0..200 {
        invoked += proxy.handle_responses();
        if invoked >= expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    invoked
}

fn collect() -> (Arc<Mutex<Vec<Value>>>, impl Fn() -> Callback) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let make = move || -> Callback {
        let sink = Arc::clone(&sink);
        Box::new(move |value| sink.lock().unwrap().push(value))
    };
    (seen, make)
}

// ============================================================================
// In-process child
// ============================================================================

mod local_tests {
    use super::*;

    fn calculator() -> ProxyChild {
        let importer = StaticImporter::new().register("calc", || {
            Arc::new(Module::new("calc").function("add", |args| {
                let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
                Ok(json!(sum))
            }))
        });
        ProxyChild::new(Arc::new(importer))
    }

    #[tokio::test]
    async fn test_echo_invokes_callback_once() {
        let mut proxy = PluginProxy::spawn_local(calculator());
        let (seen, callback) = collect();

        proxy.echo(json!("x"), callback()).await.unwrap();
        assert_eq!(drain(&mut proxy, 1).await, 1);
        assert_eq!(proxy.handle_responses(), 0);
        assert_eq!(seen.lock().unwrap().as_slice(), [json!("x")]);

        proxy.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_load_then_call() {
        let mut proxy = PluginProxy::spawn_local(calculator());
        assert_eq!(proxy.state(), ProxyState::Starting);

        proxy.load("calc").await.unwrap();
        drain(&mut proxy, 1).await;
        assert_eq!(proxy.state(), ProxyState::Ready);

        let (seen, callback) = collect();
        proxy
            .call("add", vec![json!(2), json!(3)], callback())
            .await
            .unwrap();
        drain(&mut proxy, 1).await;
        assert_eq!(seen.lock().unwrap().as_slice(), [json!([5])]);

        proxy.close().await.unwrap();
        assert_eq!(proxy.state(), ProxyState::Closed);
    }

    #[tokio::test]
    async fn test_callbacks_follow_child_order() {
        let mut proxy = PluginProxy::spawn_local(calculator());
        let (seen, callback) = collect();

        for i in 0..5 {
            proxy.echo(json!(i), callback()).await.unwrap();
        }
        assert_eq!(drain(&mut proxy, 5).await, 5);
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            [json!(0), json!(1), json!(2), json!(3), json!(4)]
        );
        proxy.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_custom_instruction() {
        let child = calculator().register("shout", |_, args, _| {
            json!(args.first().and_then(Value::as_str).unwrap_or_default().to_uppercase())
        });
        let mut proxy = PluginProxy::spawn_local(child);
        let (seen, callback) = collect();

        proxy
            .send_instruction("shout", vec![json!("hi")], Map::new(), Some(callback()))
            .await
            .unwrap();
        drain(&mut proxy, 1).await;
        assert_eq!(seen.lock().unwrap().as_slice(), [json!("HI")]);
        proxy.close().await.unwrap();
    }
}

// ============================================================================
// Child process
// ============================================================================

mod process_tests {
    use super::*;

    fn proxy_command(root: &TempDir) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_plugspace-proxy"));
        command
            .env("PLUGSPACE_PATH", root.path())
            .env("PLUGSPACE_RECURSE", "true")
            .env_remove("RUST_LOG");
        command
    }

    fn plugin_tree() -> TempDir {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("team").join("plugins");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("audio.json"),
            r#"{"methods": {"version": "1.0"}}"#,
        )
        .unwrap();
        root
    }

    #[tokio::test]
    async fn test_process_round_trip() {
        let root = plugin_tree();
        let mut proxy = PluginProxy::spawn(&mut proxy_command(&root)).unwrap();

        proxy.load("team.plugins.audio").await.unwrap();
        let (seen, callback) = collect();
        proxy.ping(callback()).await.unwrap();
        proxy.call("version", Vec::new(), callback()).await.unwrap();

        assert_eq!(drain(&mut proxy, 3).await, 3);
        assert!(proxy.is_ready());
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            [json!("pong"), json!(["1.0"])]
        );

        proxy.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_process_load_failure_is_reported() {
        let root = plugin_tree();
        let mut proxy = PluginProxy::spawn(&mut proxy_command(&root)).unwrap();

        proxy.load("team.plugins.missing").await.unwrap();
        assert_eq!(drain(&mut proxy, 1).await, 1);
        assert!(!proxy.is_ready());

        proxy.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_process_unknown_instruction_exits() {
        let root = plugin_tree();
        let mut proxy = PluginProxy::spawn(&mut proxy_command(&root)).unwrap();

        proxy
            .send_instruction("explode", Vec::new(), Map::new(), None)
            .await
            .unwrap();
        let err = proxy.close().await.unwrap_err();
        assert!(matches!(err, ProxyError::ChildExited { code: Some(1) }));
    }
}
