use indoc::indoc;
use pretty_assertions::assert_eq;
use serde_json::Value;

use swarm_service_config::*;

const TRAEFIK_SERVICE: &str = indoc! {r#"
	{
		"ID": "9mnpnzenvg8p8tdbtq4wvbkcz",
		"Version": { "Index": 19 },
		"CreatedAt": "2024-03-01T10:00:00.000000000Z",
		"Spec": {
			"Name": "traefik",
			"Labels": {
				"traefik.enable": "true",
				"traefik.http.routers.traefik-api.rule": "HostRegexp(`traefik.{domain:.+}`)"
			},
			"TaskTemplate": {
				"ContainerSpec": {
					"Image": "traefik:2.2@sha256:abc",
					"Args": ["--api", "--entrypoints.http.address=:80", "--log.level="],
					"Env": ["EXEC_PATH=/usr/local/bin/acme-dns"],
					"Mounts": [
						{
							"Type": "bind",
							"Source": "/var/run/docker.sock",
							"Target": "/var/run/docker.sock",
							"ReadOnly": true,
							"Consistency": "default"
						}
					],
					"Isolation": "default"
				},
				"Placement": { "Constraints": ["node.role == manager"], "Platforms": [] },
				"Networks": [{ "Target": "uq2o1vd4skv1", "Aliases": ["proxy"] }],
				"ForceUpdate": 0,
				"Runtime": "container"
			},
			"Mode": { "Replicated": { "Replicas": 1 } },
			"EndpointSpec": {
				"Mode": "vip",
				"Ports": [
					{ "Protocol": "tcp", "TargetPort": 80, "PublishedPort": 80, "PublishMode": "ingress" }
				]
			}
		},
		"Endpoint": { "Spec": {} }
	}
"#};

#[test]
fn unknown_fields_survive_a_round_trip() -> Result<(), Box<dyn std::error::Error>> {
	let original: Value = serde_json::from_str(TRAEFIK_SERVICE)?;
	let service: Service = serde_json::from_str(TRAEFIK_SERVICE)?;

	assert_eq!(service.id, "9mnpnzenvg8p8tdbtq4wvbkcz");
	assert_eq!(service.version.index, 19);

	let container = service
		.spec
		.container_spec()
		.expect("Missing container spec");

	assert_eq!(
		container.args.as_deref(),
		Some(
			&[
				"--api".to_string(),
				"--entrypoints.http.address=:80".to_string(),
				"--log.level=".to_string()
			][..]
		)
	);

	let mount = &container.mounts.as_ref().unwrap()[0];
	assert!(mount.is_read_only());
	assert_eq!(mount.extensions["Consistency"], Value::from("default"));

	let port = &service
		.spec
		.endpoint_spec
		.as_ref()
		.unwrap()
		.ports
		.as_ref()
		.unwrap()[0];
	assert_eq!(port.effective_protocol(), PortProtocol::Tcp);
	assert_eq!(port.publish_mode, Some(PublishMode::Ingress));

	let serialized = serde_json::to_value(&service)?;

	assert_eq!(serialized, original);

	Ok(())
}

#[test]
fn patch_keeps_untouched_fields_of_a_live_record() -> Result<(), Box<dyn std::error::Error>> {
	let service: Service = serde_json::from_str(TRAEFIK_SERVICE)?;
	let mut spec = service.spec.clone();

	let patch = Patch {
		args: Some(vec!["--api".to_string()]),
		networks: Some(vec![
			NetworkAttachmentConfig::new("uq2o1vd4skv1"),
			NetworkAttachmentConfig::new("x1"),
		]),
		..Default::default()
	};

	patch.apply_to(&mut spec);

	let updated = serde_json::to_value(&spec)?;

	assert_eq!(updated["Mode"], serde_json::json!({ "Replicated": { "Replicas": 1 } }));
	assert_eq!(updated["TaskTemplate"]["Runtime"], Value::from("container"));
	assert_eq!(
		updated["TaskTemplate"]["ContainerSpec"]["Args"],
		serde_json::json!(["--api"])
	);
	assert_eq!(
		updated["TaskTemplate"]["Networks"],
		serde_json::json!([{ "Target": "uq2o1vd4skv1" }, { "Target": "x1" }])
	);
	assert_eq!(
		updated["TaskTemplate"]["ContainerSpec"]["Image"],
		Value::from("traefik:2.2@sha256:abc")
	);

	Ok(())
}

#[test]
fn new_spec_from_patch() {
	let patch = Patch {
		image: Some("alpine/socat".to_string()),
		args: Some(vec![
			"TCP4-LISTEN:80,fork".to_string(),
			"TCP4:10.0.0.5:80".to_string(),
		]),
		..Default::default()
	};

	let spec = patch.to_new_spec("fwd");

	assert_eq!(spec.name, "fwd");
	assert_eq!(
		spec.container_spec().and_then(|c| c.image.as_deref()),
		Some("alpine/socat")
	);
	assert!(spec.endpoint_spec.is_none());
}

#[test]
fn unknown_fields_keep_their_order() -> Result<(), Box<dyn std::error::Error>> {
	let json = r#"{"Target":"/data","Source":"/srv","Type":"bind","Consistency":"default","BindOptions":{"Propagation":"rprivate"}}"#;

	let mount: Mount = serde_json::from_str(json)?;

	assert_eq!(
		mount.extensions.keys().collect::<Vec<_>>(),
		vec!["Consistency", "BindOptions"]
	);
	assert_eq!(serde_json::to_string(&mount)?, json);

	Ok(())
}
