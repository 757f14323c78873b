use std::{
	fs::{read_to_string, write},
	path::Path,
};

use indoc::indoc;
use pretty_assertions::assert_eq;
use serde_json::Value;

macro_rules! get_bin {
	() => {
		assert_cmd::Command::cargo_bin("traefikswarm").expect("Failed to find the app binary")
	};
}

macro_rules! path_to_str {
	($path:expr) => {
		&format!("file:{}", $path.display())
	};
}

const SNAPSHOT: &str = indoc! {r#"
	{
	  "services": [
	    {
	      "ID": "3k9d",
	      "Version": { "Index": 4 },
	      "Spec": {
	        "Name": "web",
	        "TaskTemplate": {
	          "ContainerSpec": { "Image": "nginx:1.25" }
	        },
	        "Mode": { "Replicated": { "Replicas": 2 } }
	      }
	    }
	  ],
	  "images": { "traefik:2.10": "sha256:1f2e" }
	}
"#};

fn read_snapshot(path: &Path) -> Value {
	let contents = read_to_string(path).unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()));

	serde_json::from_str(&contents).unwrap_or_else(|e| panic!("Invalid snapshot: {e}"))
}

fn web_labels(snapshot: &Value) -> &Value {
	&snapshot["services"][0]["Spec"]["Labels"]
}

#[test]
fn committed_changes_are_written() -> Result<(), Box<dyn std::error::Error>> {
	let dir = tempfile::tempdir()?;
	let path = dir.path().join("swarm.json");
	write(&path, SNAPSHOT)?;

	let assert = get_bin!()
		.args([
			"-H",
			path_to_str!(path),
			"--ignore-config",
			"--commit",
			"expose",
			"web",
			"8080",
			"-H",
			"a.example.com",
		])
		.assert()
		.success();

	assert!(stdout_of(&assert).starts_with("Will update service web:\n"));

	let snapshot = read_snapshot(&path);
	let labels = web_labels(&snapshot);

	assert_eq!(labels["traefik.enable"], "true");
	assert_eq!(labels["traefik.http.routers.web-8080.rule"], "Host(`a.example.com`)");
	assert_eq!(snapshot["services"][0]["Version"]["Index"], 5);
	assert_eq!(
		snapshot["services"][0]["Spec"]["Mode"]["Replicated"]["Replicas"],
		2
	);

	// Running it again has nothing left to do
	get_bin!()
		.args([
			"-H",
			path_to_str!(path),
			"--ignore-config",
			"--commit",
			"expose",
			"web",
			"8080",
			"-H",
			"a.example.com",
		])
		.assert()
		.success()
		.stdout("No changes required\n");

	Ok(())
}

#[test]
fn preview_and_declined_runs_change_nothing() -> Result<(), Box<dyn std::error::Error>> {
	let dir = tempfile::tempdir()?;
	let path = dir.path().join("swarm.json");
	write(&path, SNAPSHOT)?;

	get_bin!()
		.args(["-H", path_to_str!(path), "--ignore-config", "--preview", "unexpose", "web"])
		.assert()
		.success()
		.stdout("No changes required\n");

	let assert = get_bin!()
		.args([
			"-H",
			path_to_str!(path),
			"--ignore-config",
			"--preview",
			"service",
			"web",
			"--env-add",
			"TZ=UTC",
		])
		.assert()
		.success();

	assert!(stdout_of(&assert).starts_with("Will update service web:\n"));

	get_bin!()
		.args(["-H", path_to_str!(path), "--ignore-config", "service", "web", "--arg-add", "quiet"])
		.write_stdin("no\n")
		.assert()
		.success();

	assert_eq!(read_to_string(&path)?, SNAPSHOT);

	Ok(())
}

#[test]
fn proxy_is_created_with_init() -> Result<(), Box<dyn std::error::Error>> {
	let dir = tempfile::tempdir()?;
	let path = dir.path().join("swarm.json");
	let config_path = dir.path().join("traefikswarm.toml");

	write(&path, SNAPSHOT)?;
	write(
		&config_path,
		indoc! {r#"
			[traefik]
			image = "traefik:2.10"
		"#},
	)?;

	get_bin!()
		.args([
			"-H",
			path_to_str!(path),
			"--config",
			&config_path.to_string_lossy(),
			"--commit",
			"config",
			"--entrypoint-add",
			"https",
		])
		.assert()
		.failure();

	get_bin!()
		.args([
			"-H",
			path_to_str!(path),
			"--config",
			&config_path.to_string_lossy(),
			"--commit",
			"--init",
			"config",
			"--entrypoint-add",
			"https",
			"--image",
			"traefik:2.10",
		])
		.assert()
		.success();

	let snapshot = read_snapshot(&path);
	let traefik = &snapshot["services"][1];

	assert_eq!(traefik["Spec"]["Name"], "traefik");
	assert_eq!(
		traefik["Spec"]["TaskTemplate"]["ContainerSpec"]["Image"],
		"traefik:2.10@sha256:1f2e"
	);
	assert!(
		traefik["Spec"]["EndpointSpec"]["Ports"]
			.as_array()
			.is_some_and(|ports| ports.iter().any(|p| p["PublishedPort"] == 443))
	);

	Ok(())
}

#[test]
fn errors_exit_with_a_message() -> Result<(), Box<dyn std::error::Error>> {
	let dir = tempfile::tempdir()?;
	let path = dir.path().join("swarm.json");
	write(&path, SNAPSHOT)?;

	let assert = get_bin!()
		.args(["-H", path_to_str!(path), "--ignore-config", "--commit", "unexpose", "api"])
		.assert()
		.failure();

	assert!(String::from_utf8_lossy(&assert.get_output().stderr).contains("Service `api` not found"));

	get_bin!()
		.args(["-H", "unix:///var/run/docker.sock", "--ignore-config", "unexpose", "web"])
		.assert()
		.failure();

	get_bin!()
		.env_remove("TRAEFIKSWARM_HOST")
		.args(["--ignore-config", "unexpose", "web"])
		.assert()
		.failure();

	Ok(())
}

fn stdout_of(assert: &assert_cmd::assert::Assert) -> String {
	String::from_utf8_lossy(&assert.get_output().stdout).into_owned()
}
