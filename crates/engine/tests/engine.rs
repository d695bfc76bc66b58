#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    path::Path,
    time::{Duration, SystemTime},
};

use {
    serde_json::json,
    tendril_config::PluginType,
    tendril_engine::{Engine, EngineOptions, Error},
};

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn options(cache: &Path) -> EngineOptions {
    EngineOptions {
        reset_cache: false,
        cache_dir: Some(cache.to_path_buf()),
    }
}

fn basic_app(root: &Path) {
    write(
        root,
        "plugin.toml",
        "name = \"app\"\nversion = \"1.0.0\"\n[cli]\ncommands = \"./commands\"\n",
    );
    write(root, "commands/foo.toml", "description = \"do foo\"\n");
    write(root, "commands/bar/baz.toml", "");
    write(root, "commands/bar/index.toml", "description = \"bar root\"\n");
}

/// Push a file's modification time forward so freshness scans see it.
fn bump_mtime(path: &Path, secs: u64) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(secs))
        .unwrap();
}

#[tokio::test]
async fn end_to_end_listing() {
    let root = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    basic_app(root.path());

    let engine = Engine::load(root.path(), options(cache.path())).await.unwrap();

    assert_eq!(engine.config().name, "app");
    assert_eq!(engine.command_ids(), ["foo", "bar:baz", "bar"]);
    let roots: Vec<_> = engine.root_commands().iter().map(|c| c.id()).collect();
    assert_eq!(roots, ["foo", "bar"]);
    assert!(engine.find_topic("bar").is_some());
    assert_eq!(engine.root_topics().len(), 1);

    let under_bar: Vec<_> = engine.topic_commands("bar").iter().map(|c| c.id()).collect();
    assert_eq!(under_bar, ["bar:baz"]);

    assert_eq!(
        engine.find_command("foo").unwrap().metadata.description.as_deref(),
        Some("do foo")
    );
    assert!(engine.find_command("nope").is_none());
    assert!(matches!(
        engine.find_command_must("nope"),
        Err(Error::CommandNotFound { .. })
    ));
    assert!(matches!(
        engine.find_topic_must("nope"),
        Err(Error::TopicNotFound { .. })
    ));
    assert!(cache.path().join("commands/core/app.json").is_file());
}

#[tokio::test]
async fn nested_ids_synthesize_every_parent_topic() {
    let root = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    write(
        root.path(),
        "plugin.toml",
        "name = \"deep\"\nversion = \"1.0.0\"\n[cli]\ncommands = \"cmds\"\n\n[[cli.topics]]\nname = \"a\"\ndescription = \"declared\"\n",
    );
    write(root.path(), "cmds/a/b/c.toml", "");

    let engine = Engine::load(root.path(), options(cache.path())).await.unwrap();
    let names: Vec<_> = engine.topics().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["a", "a:b"]);
    assert_eq!(
        engine.find_topic("a").unwrap().description.as_deref(),
        Some("declared")
    );
    assert!(engine.find_topic("a:b:c").is_none());
    assert!(engine.root_commands().is_empty());
}

#[tokio::test]
async fn unversioned_plugin_serves_stale_cache_until_reset() {
    let root = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    basic_app(root.path());

    let first = Engine::load(root.path(), options(cache.path())).await.unwrap();
    assert_eq!(first.commands().len(), 3);

    write(root.path(), "commands/qux.toml", "");
    let stale = Engine::load(root.path(), options(cache.path())).await.unwrap();
    assert!(stale.find_command("qux").is_none());

    let reset = Engine::load(
        root.path(),
        EngineOptions {
            reset_cache: true,
            ..options(cache.path())
        },
    )
    .await
    .unwrap();
    assert!(reset.find_command("qux").is_some());
}

#[tokio::test]
async fn versioned_plugin_picks_up_edits() {
    let root = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    basic_app(root.path());
    gix::init(root.path()).unwrap();

    let first = Engine::load(root.path(), options(cache.path())).await.unwrap();
    assert!(first.find_command("qux").is_none());

    let again = Engine::load(root.path(), options(cache.path())).await.unwrap();
    assert_eq!(again.command_ids(), first.command_ids());

    write(root.path(), "commands/qux.toml", "");
    bump_mtime(&root.path().join("commands/qux.toml"), 60);
    let edited = Engine::load(root.path(), options(cache.path())).await.unwrap();
    assert!(edited.find_command("qux").is_some());
}

#[tokio::test]
async fn static_sub_plugins_are_flat_and_last_command_wins() {
    let root = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    write(
        root.path(),
        "plugin.toml",
        "name = \"host\"\nversion = \"1.0.0\"\n[cli]\ncommands = \"commands\"\nplugins = [\"extra\", \"ghost\"]\n",
    );
    write(root.path(), "commands/hello.toml", "description = \"host hello\"\n");
    write(
        root.path(),
        "plugins/extra/plugin.toml",
        "name = \"extra\"\nversion = \"0.1.0\"\n[cli]\ncommands = \"commands\"\n",
    );
    write(
        root.path(),
        "plugins/extra/commands/hello.toml",
        "description = \"extra hello\"\n",
    );
    write(root.path(), "plugins/extra/commands/tool/run.toml", "");

    let engine = Engine::load(root.path(), options(cache.path())).await.unwrap();

    let mut names: Vec<_> = engine.plugins().iter().map(|p| p.name.as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, ["extra", "host"]);
    assert!(engine.find_plugin("host").unwrap().children().is_empty());

    let hello = engine.find_command("hello").unwrap();
    assert_eq!(hello.metadata.plugin_name.as_deref(), Some("extra"));
    assert_eq!(hello.metadata.description.as_deref(), Some("extra hello"));
    assert_eq!(
        engine.commands().iter().filter(|c| c.id() == "hello").count(),
        1
    );
    assert!(engine.find_topic("tool").is_some());
}

#[tokio::test]
async fn entry_point_children_nest_under_parent() {
    use std::os::unix::fs::PermissionsExt;

    let root = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    write(
        root.path(),
        "plugin.toml",
        "name = \"host\"\nversion = \"1.0.0\"\n[cli]\nplugins_entry = \"bin/list\"\n",
    );
    write(
        root.path(),
        "bin/list",
        "#!/bin/sh\necho '[{\"root\": \"linked/kid\", \"type\": \"link\"}, {\"root\": \"linked/absent\"}]'\n",
    );
    std::fs::set_permissions(
        root.path().join("bin/list"),
        std::fs::Permissions::from_mode(0o755),
    )
    .unwrap();
    write(
        root.path(),
        "linked/kid/plugin.toml",
        "name = \"kid\"\nversion = \"2.0.0\"\n[cli]\ncommands = \"commands\"\n",
    );
    write(root.path(), "linked/kid/commands/play.toml", "");

    let engine = Engine::load(root.path(), options(cache.path())).await.unwrap();

    let host = engine.find_plugin("host").unwrap();
    let kids: Vec<_> = host.children().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(kids, ["kid"]);
    let kid = engine.find_plugin("kid").unwrap();
    assert_eq!(kid.plugin_type, PluginType::Link);
    assert_eq!(
        engine.find_command("play").unwrap().metadata.plugin_type,
        Some(PluginType::Link)
    );
    assert!(cache.path().join("commands/link/kid.json").is_file());
}

fn hook_app(root: &Path, parse_hook: Option<&str>) {
    let mut descriptor = String::from(
        "name = \"hooked\"\nversion = \"1.0.0\"\n[cli]\nplugins = [\"child\"]\n[cli.hooks]\ninit = [\"echo root >> ../log.txt\", \"exit 3\"]\nabort = \"./hooks/abort.toml\"\n",
    );
    if let Some(hook) = parse_hook {
        descriptor.push_str(&format!("\"plugins:parse\" = \"{hook}\"\n"));
    }
    write(root, "app/plugin.toml", &descriptor);
    write(
        root,
        "app/hooks/abort.toml",
        "command = \"echo '{\\\"action\\\":\\\"exit\\\",\\\"code\\\":9}'\"\n",
    );
    write(
        root,
        "app/plugins/child/plugin.toml",
        "name = \"child\"\nversion = \"1.0.0\"\n[cli.hooks]\ninit = \"cat > ../../../payload.json\"\n",
    );
}

#[tokio::test]
async fn hooks_merge_across_plugins_and_isolate_failures() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    hook_app(tmp.path(), None);

    let engine = Engine::load(tmp.path().join("app"), options(cache.path()))
        .await
        .unwrap();
    assert_eq!(engine.hook_events(), ["abort", "init"]);

    engine
        .run_hook("init", json!({"id": "foo", "argv": []}))
        .await
        .unwrap();
    assert_eq!(
        std::fs::read_to_string(tmp.path().join("log.txt"))
            .unwrap()
            .trim(),
        "root"
    );
    let payload: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(tmp.path().join("payload.json")).unwrap())
            .unwrap();
    assert_eq!(payload["id"], "foo");
    assert_eq!(payload["config"]["name"], "hooked");

    engine.run_hook("unknown", json!({})).await.unwrap();

    let err = engine.run_hook("abort", json!({})).await.unwrap_err();
    assert_eq!(err.exit_code(), Some(9));
}

#[tokio::test]
async fn post_load_exit_fails_load() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    hook_app(tmp.path(), Some("./hooks/abort.toml"));

    let err = Engine::load(tmp.path().join("app"), options(cache.path()))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::HookExit { code: 9 }));
}

#[tokio::test]
async fn post_load_hook_sees_every_plugin() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    hook_app(tmp.path(), Some("cat > ../parsed.json"));

    Engine::load(tmp.path().join("app"), options(cache.path()))
        .await
        .unwrap();
    let parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(tmp.path().join("parsed.json")).unwrap())
            .unwrap();
    let mut names: Vec<_> = parsed["plugins"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect();
    names.sort_unstable();
    assert_eq!(names, ["child", "hooked"]);
}

#[tokio::test]
async fn missing_root_descriptor_fails() {
    let root = tempfile::tempdir().unwrap();
    let err = Engine::load(root.path(), EngineOptions::default())
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::Load(_)));
}

#[tokio::test]
async fn run_command_executes_manifest() {
    let root = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    write(
        root.path(),
        "plugin.toml",
        "name = \"runner\"\nversion = \"1.0.0\"\n[cli]\ncommands = \"commands\"\n",
    );
    write(
        root.path(),
        "commands/greet.toml",
        "run = \"echo \\\"$TENDRIL_COMMAND_ID:$1\\\" > out.txt\"\n",
    );
    write(root.path(), "commands/fail.toml", "run = \"exit 4\"\n");

    let engine = Engine::load(root.path(), options(cache.path())).await.unwrap();
    engine
        .run_command("greet", &["world".to_string()])
        .await
        .unwrap();
    assert_eq!(
        std::fs::read_to_string(root.path().join("out.txt"))
            .unwrap()
            .trim(),
        "greet:world"
    );

    assert!(matches!(
        engine.run_command("fail", &[]).await,
        Err(Error::Command { .. })
    ));
    assert!(matches!(
        engine.run_command("absent", &[]).await,
        Err(Error::CommandNotFound { .. })
    ));
}
