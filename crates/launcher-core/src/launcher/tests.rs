use super::*;
use crate::account::OfflineAccount;
use crate::config::LauncherConfig;
use crate::launcher::download::{DownloadBatch, DownloadError, DownloadTask};
use crate::launcher::versions::ManifestCache;
use crate::platform::{OsKind, Platform};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
struct Request {
    path: String,
    range: Option<String>,
}

type Routes = Arc<Mutex<HashMap<String, Vec<u8>>>>;

/// Minimal HTTP/1.1 file server honoring `Range: bytes=N-`.
struct TestServer {
    base: String,
    routes: Routes,
    requests: Arc<Mutex<Vec<Request>>>,
}

impl TestServer {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let routes: Routes = Arc::default();
        let requests: Arc<Mutex<Vec<Request>>> = Arc::default();

        let (served_routes, log) = (routes.clone(), requests.clone());
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let (routes, log) = (served_routes.clone(), log.clone());
                tokio::spawn(async move {
                    let _ = respond(stream, routes, log).await;
                });
            }
        });

        Self {
            base,
            routes,
            requests,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn route(&self, path: &str, body: impl Into<Vec<u8>>) {
        self.routes.lock().unwrap().insert(path.to_string(), body.into());
    }

    fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    fn requested(&self, path: &str) -> bool {
        self.requests().iter().any(|request| request.path == path)
    }
}

async fn respond(
    mut stream: TcpStream,
    routes: Routes,
    log: Arc<Mutex<Vec<Request>>>,
) -> std::io::Result<()> {
    let mut head = Vec::new();
    let mut chunk = [0u8; 1024];
    while !head.windows(4).any(|window| window == b"\r\n\r\n") {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Ok(());
        }
        head.extend_from_slice(&chunk[..read]);
    }
    let head = String::from_utf8_lossy(&head).to_string();
    let mut lines = head.lines();
    let path = lines
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let range = lines.find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.eq_ignore_ascii_case("range")
            .then(|| value.trim().to_string())
    });
    log.lock().unwrap().push(Request {
        path: path.clone(),
        range: range.clone(),
    });

    let body = routes.lock().unwrap().get(&path).cloned();
    let start = range
        .as_deref()
        .and_then(|value| value.strip_prefix("bytes="))
        .and_then(|value| value.trim_end_matches('-').parse::<usize>().ok());
    let (status, body) = match (body, start) {
        (None, _) => ("404 Not Found", Vec::new()),
        (Some(body), Some(start)) if start < body.len() => ("206 Partial Content", body[start..].to_vec()),
        (Some(_), Some(_)) => ("416 Range Not Satisfiable", Vec::new()),
        (Some(body), None) => ("200 OK", body),
    };
    let header = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(header.as_bytes()).await?;
    stream.write_all(&body).await?;
    stream.shutdown().await
}

fn sha1_hex(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

fn linux() -> Platform {
    Platform::new(OsKind::Linux, "6.1", "x86_64")
}

fn context(root: &Path, server: &str) -> LauncherContext {
    let config = LauncherConfig {
        work_dir: root.to_path_buf(),
        manifest_url: format!("{server}/manifest.json"),
        assets_base_url: format!("{server}/assets"),
        ..LauncherConfig::default()
    };
    LauncherContext::with_parts(reqwest::Client::new(), config, linux())
}

fn client_jar_bytes() -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    writer.start_file("META-INF/MANIFEST.MF", options).unwrap();
    writer.write_all(b"Manifest-Version: 1.0").unwrap();
    writer.start_file("net/minecraft/client/main/Main.class", options).unwrap();
    writer.write_all(b"vanilla").unwrap();
    writer.finish().unwrap().into_inner()
}

fn download_json(server: &TestServer, route: &str, body: &[u8]) -> serde_json::Value {
    serde_json::json!({
        "url": server.url(route),
        "sha1": sha1_hex(body),
        "size": body.len(),
    })
}

/// Serves a 1.20.1-shaped version: one plain library, one Windows-only
/// native library, one library carrying only a Windows classifier, and a
/// single asset object.
fn publish_release(server: &TestServer) -> (Vec<u8>, String) {
    let client = client_jar_bytes();
    let core = b"core library".to_vec();
    let legacy = b"legacy library".to_vec();
    let windows_native = b"windows native".to_vec();
    let icon = b"icon bytes".to_vec();
    let icon_hash = sha1_hex(&icon);

    let index = serde_json::to_vec(&serde_json::json!({
        "objects": { "icons/icon_16x16.png": { "hash": icon_hash, "size": icon.len() } }
    }))
    .unwrap();

    let mut native_artifact = download_json(server, "/libs/lwjgl-natives-windows.jar", &windows_native);
    native_artifact["path"] = "org/lwjgl/lwjgl/3.3.1/lwjgl-3.3.1-natives-windows.jar".into();
    let mut core_artifact = download_json(server, "/libs/core.jar", &core);
    core_artifact["path"] = "com/example/core/1.0/core-1.0.jar".into();
    let mut legacy_artifact = download_json(server, "/libs/legacy.jar", &legacy);
    legacy_artifact["path"] = "com/example/legacy/1.0/legacy-1.0.jar".into();
    let legacy_classifier = download_json(server, "/libs/legacy-natives-windows.jar", &windows_native);

    let mut asset_index = download_json(server, "/indexes/5.json", &index);
    asset_index["id"] = "5".into();

    let version = serde_json::json!({
        "id": "1.20.1",
        "type": "release",
        "mainClass": "net.minecraft.client.main.Main",
        "assets": "5",
        "assetIndex": asset_index,
        "downloads": { "client": download_json(server, "/client.jar", &client) },
        "libraries": [
            { "name": "com.example:core:1.0", "downloads": { "artifact": core_artifact } },
            {
                "name": "org.lwjgl:lwjgl:3.3.1:natives-windows",
                "downloads": { "artifact": native_artifact },
                "rules": [{ "action": "allow", "os": { "name": "windows" } }]
            },
            {
                "name": "com.example:legacy:1.0",
                "downloads": {
                    "artifact": legacy_artifact,
                    "classifiers": { "natives-windows": legacy_classifier }
                }
            }
        ],
        "arguments": {
            "jvm": ["-Djava.library.path=${natives_directory}", "-cp", "${classpath}"],
            "game": ["--username", "${auth_player_name}", "--gameDir", "${game_directory}"]
        }
    });
    let manifest = serde_json::json!({
        "latest": { "release": "1.20.1", "snapshot": "1.20.1" },
        "versions": [{ "id": "1.20.1", "type": "release", "url": server.url("/v/1.20.1.json") }]
    });

    server.route("/manifest.json", serde_json::to_vec(&manifest).unwrap());
    server.route("/v/1.20.1.json", serde_json::to_vec(&version).unwrap());
    server.route("/client.jar", client.clone());
    server.route("/indexes/5.json", index);
    server.route("/libs/core.jar", core);
    server.route("/libs/legacy.jar", legacy);
    server.route("/libs/lwjgl-natives-windows.jar", windows_native.clone());
    server.route("/libs/legacy-natives-windows.jar", windows_native);
    server.route(&format!("/assets/{}/{icon_hash}", &icon_hash[..2]), icon);
    (client, icon_hash)
}

#[tokio::test]
async fn installs_release_on_linux_without_windows_natives() {
    let temp = tempfile::tempdir().unwrap();
    let server = TestServer::start().await;
    let (client, icon_hash) = publish_release(&server);
    let ctx = context(temp.path(), &server.base);
    let instance = InstanceDirs::new(ctx.dirs.instances.join("Vanilla"));

    let installed = Installer::new(&ctx)
        .ensure_installed("1.20.1", &instance, false, &NoopListener)
        .await
        .unwrap();

    assert_eq!(std::fs::read(&installed.client_jar).unwrap(), client);
    assert_eq!(
        installed.libraries,
        vec![
            ctx.dirs.libraries.join("com/example/core/1.0/core-1.0.jar"),
            ctx.dirs.libraries.join("com/example/legacy/1.0/legacy-1.0.jar"),
        ]
    );
    assert!(installed.libraries.iter().all(|path| path.exists()));
    assert!(!server.requested("/libs/lwjgl-natives-windows.jar"));
    assert!(!server.requested("/libs/legacy-natives-windows.jar"));
    assert!(installed.natives_dir.is_dir());
    assert!(ctx.dirs.asset_object(&icon_hash).exists());
    assert_eq!(installed.assets.as_ref().map(|layout| layout.index_id.as_str()), Some("5"));
    assert!(installed.java.is_none());

    let before = server.requests().len();
    Installer::new(&ctx)
        .ensure_installed("1.20.1", &instance, false, &NoopListener)
        .await
        .unwrap();
    assert_eq!(server.requests().len(), before, "second install should hit only caches");
}

#[tokio::test]
async fn unknown_version_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let server = TestServer::start().await;
    publish_release(&server);
    let ctx = context(temp.path(), &server.base);
    let instance = InstanceDirs::new(ctx.dirs.instances.join("Nope"));

    let err = Installer::new(&ctx)
        .ensure_installed("0.0.1", &instance, false, &NoopListener)
        .await
        .unwrap_err();
    assert!(matches!(err, LauncherError::VersionNotFound(id) if id == "0.0.1"));
}

#[tokio::test]
async fn resume_appends_partial_content() {
    let temp = tempfile::tempdir().unwrap();
    let server = TestServer::start().await;
    let body = b"0123456789abcdef".to_vec();
    server.route("/big.bin", body.clone());

    let path = temp.path().join("big.bin");
    std::fs::write(&path, &body[..6]).unwrap();
    let task = DownloadTask::new(server.url("/big.bin"), &path)
        .with_size(body.len() as u64)
        .with_sha1(sha1_hex(&body))
        .if_needed()
        .unwrap();
    assert_eq!(task.resume_offset, 6);

    let mut batch = DownloadBatch::new(reqwest::Client::new(), 2, "Resume");
    batch.add(task);
    batch.run_all(&NoopListener).await.unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), body);
    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].range.as_deref(), Some("bytes=6-"));
}

#[tokio::test]
async fn sha1_mismatch_fails_only_that_task() {
    let temp = tempfile::tempdir().unwrap();
    let server = TestServer::start().await;
    server.route("/good.bin", b"good".to_vec());
    server.route("/bad.bin", b"tampered".to_vec());

    let good = temp.path().join("good.bin");
    let bad = temp.path().join("bad.bin");
    let mut batch = DownloadBatch::new(reqwest::Client::new(), 2, "Mixed");
    batch.add(DownloadTask::new(server.url("/good.bin"), &good).with_sha1(sha1_hex(b"good")));
    batch.add(DownloadTask::new(server.url("/bad.bin"), &bad).with_sha1(sha1_hex(b"original")));

    let err = batch.run_all(&NoopListener).await.unwrap_err();
    let failures = err.failures();
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0], DownloadError::Integrity { path, .. } if path == &bad));
    assert!(!bad.exists());
    assert_eq!(std::fs::read(&good).unwrap(), b"good");
}

#[tokio::test]
async fn stale_manifest_survives_network_failure() {
    let temp = tempfile::tempdir().unwrap();
    let ctx = context(temp.path(), "http://127.0.0.1:1");
    let cache = ManifestCache::new(&ctx);

    let path = cache.manifest_path();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        r#"{"latest":{"release":"1.20.1","snapshot":"1.20.1"},"versions":[{"id":"1.20.1","type":"release","url":"http://127.0.0.1:1/v.json"}]}"#,
    )
    .unwrap();
    let four_hours_ago = SystemTime::now() - Duration::from_secs(4 * 60 * 60);
    std::fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(four_hours_ago)
        .unwrap();

    let manifest = cache.manifest(false).await.unwrap();
    assert_eq!(manifest.latest.release, "1.20.1");
    assert!(manifest.find("1.20.1").is_some());

    std::fs::remove_file(&path).unwrap();
    let err = cache.manifest(false).await.unwrap_err();
    assert!(matches!(err, LauncherError::ManifestFetch(_)));
}

#[tokio::test]
async fn manifest_is_returned_when_cache_cannot_be_written() {
    let temp = tempfile::tempdir().unwrap();
    let server = TestServer::start().await;
    publish_release(&server);
    let ctx = context(temp.path(), &server.base);
    let cache = ManifestCache::new(&ctx);

    // A plain file where the versions directory should be.
    std::fs::create_dir_all(ctx.dirs.versions.parent().unwrap()).unwrap();
    std::fs::write(&ctx.dirs.versions, b"not a directory").unwrap();

    let manifest = cache.manifest(true).await.unwrap();
    assert_eq!(manifest.latest.release, "1.20.1");
    assert!(!cache.manifest_path().exists());
}

#[tokio::test]
async fn correct_size_client_jar_is_trusted() {
    let temp = tempfile::tempdir().unwrap();
    let server = TestServer::start().await;
    let (client, _) = publish_release(&server);
    let ctx = context(temp.path(), &server.base);
    let instance = InstanceDirs::new(ctx.dirs.instances.join("Vanilla"));

    let installed = Installer::new(&ctx)
        .ensure_installed("1.20.1", &instance, false, &NoopListener)
        .await
        .unwrap();
    std::fs::write(&installed.client_jar, vec![b'x'; client.len()]).unwrap();

    let before = server.requests().len();
    Installer::new(&ctx)
        .ensure_installed("1.20.1", &instance, false, &NoopListener)
        .await
        .unwrap();
    let fetched: Vec<String> = server.requests()[before..]
        .iter()
        .map(|request| request.path.clone())
        .collect();
    assert!(!fetched.contains(&"/client.jar".to_string()), "refetched: {fetched:?}");
    assert_eq!(std::fs::read(&installed.client_jar).unwrap(), vec![b'x'; client.len()]);
}

#[cfg(unix)]
#[tokio::test]
async fn session_runs_game_and_records_exit() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempfile::tempdir().unwrap();
    let server = TestServer::start().await;
    publish_release(&server);
    let ctx = context(temp.path(), &server.base);

    let java = temp.path().join("fake-java");
    std::fs::write(&java, "#!/bin/sh\necho \"$@\" > \"$APPDATA/args.txt\"\necho '[main/INFO]: started'\nexit 7\n").unwrap();
    std::fs::set_permissions(&java, std::fs::Permissions::from_mode(0o755)).unwrap();

    let mut patch = zip::ZipWriter::new(std::fs::File::create(temp.path().join("patch.zip")).unwrap());
    patch
        .start_file("net/minecraft/client/main/Main.class", zip::write::SimpleFileOptions::default())
        .unwrap();
    patch.write_all(b"patched").unwrap();
    patch.finish().unwrap();

    let registry = InstanceRegistry::new(ctx.dirs.instances.clone());
    registry.create("Vanilla", None, "1.20.1").unwrap();
    registry
        .update("Vanilla", |instance| instance.java_path = Some(java.clone()))
        .unwrap();
    registry.add_jar_mod("Vanilla", &temp.path().join("patch.zip")).unwrap();

    let runner = InstanceRunner::new(&ctx, registry.clone(), "Vanilla", Arc::new(NoopListener));
    let mut account = OfflineAccount::new("Steve");
    let code = runner.launch(&mut account).await.unwrap();

    assert_eq!(code, 7);
    assert_eq!(runner.state(), SessionState::Idle);
    let instance = registry.get("Vanilla").unwrap();
    assert!(!instance.running);
    assert_eq!(instance.last_exit_code, Some(7));
    assert!(instance.last_time_played.is_some());

    let work_dir = registry.dirs("Vanilla").work_dir;
    let args = std::fs::read_to_string(work_dir.join("args.txt")).unwrap();
    assert!(args.starts_with("-Xms512m -Xmx2048m"));
    assert!(args.contains("net.minecraft.client.main.Main --username Steve"));
    assert!(args.contains(&work_dir.join("client-").display().to_string()));

    let leftovers: Vec<PathBuf> = std::fs::read_dir(&work_dir)
        .unwrap()
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "jar"))
        .collect();
    assert!(leftovers.is_empty(), "overlay jars left behind: {leftovers:?}");
}

#[cfg(unix)]
#[tokio::test]
async fn stop_after_exit_does_not_kill_next_session() {
    use std::os::unix::fs::PermissionsExt;

    let temp = tempfile::tempdir().unwrap();
    let server = TestServer::start().await;
    publish_release(&server);
    let ctx = context(temp.path(), &server.base);

    let java = temp.path().join("fake-java");
    std::fs::write(&java, "#!/bin/sh\nsleep 1\nexit 0\n").unwrap();
    std::fs::set_permissions(&java, std::fs::Permissions::from_mode(0o755)).unwrap();

    let registry = InstanceRegistry::new(ctx.dirs.instances.clone());
    registry.create("Vanilla", None, "1.20.1").unwrap();
    registry
        .update("Vanilla", |instance| instance.java_path = Some(java.clone()))
        .unwrap();

    let runner = InstanceRunner::new(&ctx, registry.clone(), "Vanilla", Arc::new(NoopListener));
    // A stop landing after the previous game already exited.
    runner.set_state(SessionState::Running);
    runner.stop();
    runner.set_state(SessionState::Idle);

    let mut account = OfflineAccount::new("Steve");
    let code = runner.launch(&mut account).await.unwrap();
    assert_eq!(code, 0);
    assert_eq!(registry.get("Vanilla").unwrap().last_exit_code, Some(0));
}

#[tokio::test]
async fn failed_authentication_clears_running_flag() {
    let temp = tempfile::tempdir().unwrap();
    let ctx = context(temp.path(), "http://127.0.0.1:1");
    let registry = InstanceRegistry::new(ctx.dirs.instances.clone());
    registry.create("Vanilla", None, "1.20.1").unwrap();

    let runner = InstanceRunner::new(&ctx, registry.clone(), "Vanilla", Arc::new(NoopListener));
    let mut account = OfflineAccount::new("");
    let err = runner.launch(&mut account).await.unwrap_err();

    assert!(matches!(err, LauncherError::Auth(_)));
    assert_eq!(runner.state(), SessionState::Idle);
    assert!(!registry.get("Vanilla").unwrap().running);
    assert!(registry.try_start("Vanilla").is_ok());
}
