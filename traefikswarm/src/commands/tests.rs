use clap::Parser;
use maplit::btreemap;
use pretty_assertions::assert_eq;
use swarm_service_config::{Service, ServiceSpec};

use super::*;
use crate::{
	cli::Cli,
	cluster::{Snapshot, SnapshotCluster},
	routing::{BASIC_AUTH_USERS_LABEL, Route, RouterProtocol, decode_entrypoints},
	service::ServiceState,
	session::SessionOptions,
};

fn web_record() -> Service {
	let mut spec = ServiceSpec::new("web");
	spec.container_spec_mut().image = Some("nginx:1.25".to_string());

	Service {
		id: "web-id".to_string(),
		spec,
		..Default::default()
	}
}

fn cluster_with(services: Vec<Service>) -> SnapshotCluster {
	SnapshotCluster::in_memory(Snapshot {
		services,
		..Default::default()
	})
}

/// Runs a command line against `cluster` and returns the services in scope, without applying.
fn run(cluster: &mut SnapshotCluster, args: &[&str]) -> AppResult<Vec<ServiceState>> {
	let cli = Cli::try_parse_from(std::iter::once("traefikswarm").chain(args.iter().copied()))
		.map_err(|e| anyhow::anyhow!(e.to_string()))?;

	let options = SessionOptions {
		init: cli.init,
		..Default::default()
	};

	let mut session = Session::load(cluster, cli.stack.clone(), options)?;
	cli.command.execute(&mut session, &Config::default())?;

	let names = ["traefik", "web", "forward"];

	Ok(names
		.iter()
		.filter_map(|name| {
			session
				.get_global_service(name)
				.cloned()
				.or_else(|| session.get_service(name).cloned())
		})
		.collect())
}

fn find<'a>(services: &'a [ServiceState], name: &str) -> &'a ServiceState {
	services
		.iter()
		.find(|s| s.name() == name)
		.unwrap()
}

#[test]
fn config_needs_init_for_a_new_proxy() {
	let mut cluster = cluster_with(Vec::new());

	assert!(matches!(
		run(&mut cluster, &["config"]),
		Err(AppError::PreconditionFailed(_))
	));
}

#[test]
fn default_entrypoints_and_redirect() -> AppResult {
	let mut cluster = cluster_with(Vec::new());

	let services = run(
		&mut cluster,
		&[
			"--init",
			"config",
			"--entrypoint-add",
			"http",
			"--entrypoint-add",
			"https",
		],
	)?;

	let traefik = find(&services, "traefik");
	let entrypoints = decode_entrypoints(traefik)?;

	let http = &entrypoints["http"];
	assert_eq!(http.port(), Some(80));
	assert!(!http.tls());
	assert!(!http.acme());

	let redirect = http.redirect().unwrap();
	assert_eq!(redirect.entrypoint, "https");
	assert_eq!(redirect.scheme.as_deref(), Some("https"));

	let https = &entrypoints["https"];
	assert_eq!(https.port(), Some(443));
	assert!(https.tls());
	assert!(https.acme());

	assert_eq!(traefik.ports().len(), 2);
	assert!(traefik.args().contains("--providers.docker"));
	assert!(traefik.mount("/var/run/docker.sock").is_some());
	assert_eq!(traefik.constraints().collect::<Vec<_>>(), vec!["node.role == manager"]);

	Ok(())
}

#[test]
fn reconfiguring_a_live_proxy_is_a_no_op() -> AppResult {
	let mut cluster = cluster_with(Vec::new());

	let args = [
		"--init",
		"config",
		"--entrypoint-add",
		"http",
		"--entrypoint-add",
		"https",
		"--acme-domains",
		"example.com",
		"--acme-domains",
		"*.example.com",
		"--acme-email",
		"ops@example.com",
		"--api",
		"--user-add",
		"admin:$apr1$xyz",
	];

	let mut services = run(&mut cluster, &args)?;
	services[0].apply(&mut cluster)?;

	let services = run(&mut cluster, &args)?;
	let traefik = find(&services, "traefik");

	assert!(!traefik.dirty(), "{:?}", traefik.patch());
	assert_eq!(traefik.label(BASIC_AUTH_USERS_LABEL), Some("admin:$apr1$xyz"));

	let entrypoints = decode_entrypoints(traefik)?;
	assert_eq!(entrypoints["https"].acme_domains(), vec!["example.com", "*.example.com"]);
	// Domains are only kept on ACME entry points
	assert!(entrypoints["http"].acme_domains().is_empty());

	Ok(())
}

#[test]
fn nonstandard_entrypoints_need_a_port() -> AppResult {
	let mut cluster = cluster_with(Vec::new());

	assert!(matches!(
		run(&mut cluster, &["--init", "config", "--entrypoint-add", "metrics"]),
		Err(AppError::PreconditionFailed(_))
	));

	let services = run(
		&mut cluster,
		&["--init", "config", "--entrypoint-add", "dns=53/udp"],
	)?;

	let dns = &decode_entrypoints(find(&services, "traefik"))?["dns"];

	assert_eq!(dns.port(), Some(53));
	assert_eq!(dns.protocol().as_deref(), Some("udp"));
	assert!(!dns.tls());

	Ok(())
}

#[test]
fn entrypoint_removal() -> AppResult {
	let mut cluster = cluster_with(Vec::new());

	let mut services = run(
		&mut cluster,
		&["--init", "config", "--entrypoint-add", "http", "--entrypoint-add", "https"],
	)?;
	services[0].apply(&mut cluster)?;

	let mut services = run(&mut cluster, &["config", "--entrypoint-rm", "https"])?;
	let traefik = find(&services, "traefik");

	let entrypoints = decode_entrypoints(traefik)?;
	assert_eq!(entrypoints.keys().collect::<Vec<_>>(), vec!["http"]);
	assert_eq!(entrypoints["http"].redirect(), None);
	assert_eq!(traefik.ports().len(), 1);
	assert_eq!(traefik.ports()[0].target_port, Some(80));

	services[0].apply(&mut cluster)?;

	assert!(matches!(
		run(&mut cluster, &["config", "--entrypoint-rm", "https"]),
		Err(AppError::PreconditionFailed(_))
	));

	Ok(())
}

#[test]
fn moved_entrypoint_publishes_only_its_new_port() -> AppResult {
	let mut cluster = cluster_with(Vec::new());

	let mut services = run(&mut cluster, &["--init", "config", "--entrypoint-add", "http"])?;
	services[0].apply(&mut cluster)?;

	let mut services = run(&mut cluster, &["config", "--entrypoint-add", "http=8080"])?;

	let published: Vec<_> = services[0]
		.ports()
		.iter()
		.map(|p| (p.target_port, p.published_port))
		.collect();
	assert_eq!(published, vec![(Some(8080), Some(8080))]);

	services[0].apply(&mut cluster)?;

	let services = run(&mut cluster, &["config", "--entrypoint-rm", "http"])?;

	assert!(services[0].ports().is_empty());
	assert!(decode_entrypoints(&services[0])?.is_empty());

	Ok(())
}

#[test]
fn unrelated_traefik_like_labels_do_not_block_a_run() -> AppResult {
	let monitor = Service {
		id: "monitor-id".to_string(),
		spec: ServiceSpec {
			labels: Some(btreemap! {
				"traefik-version".to_string() => "2.2".to_string(),
				"traefik_x".to_string() => "1".to_string(),
			}),
			..ServiceSpec::new("monitor")
		},
		..Default::default()
	};

	let mut cluster = cluster_with(vec![web_record(), monitor]);

	let services = run(&mut cluster, &["expose", "web", "8080", "-H", "a.example.com"])?;

	assert_eq!(
		find(&services, "web").label("traefik.http.routers.web-8080.rule"),
		Some("Host(`a.example.com`)")
	);

	Ok(())
}

#[test]
fn explicit_acme_server_wins_over_staging() -> AppResult {
	let mut cluster = cluster_with(Vec::new());

	let services = run(
		&mut cluster,
		&[
			"--init",
			"config",
			"--acme-staging",
			"--acme-server",
			"https://acme.internal/directory",
		],
	)?;

	assert_eq!(
		find(&services, "traefik")
			.args()
			.get("--certificatesResolvers.acme.acme.caServer"),
		Some(Some("https://acme.internal/directory"))
	);

	let services = run(&mut cluster, &["--init", "config", "--acme-staging"])?;

	assert_eq!(
		find(&services, "traefik")
			.args()
			.get("--certificatesResolvers.acme.acme.caServer"),
		Some(Some("https://acme-staging-v02.api.letsencrypt.org/directory"))
	);

	Ok(())
}

#[test]
fn expose_with_hosts() -> AppResult {
	let mut cluster = cluster_with(vec![web_record()]);

	let services = run(
		&mut cluster,
		&["expose", "web", "8080", "-H", "a.example.com", "-H", "b.example.com"],
	)?;

	let web = find(&services, "web");
	let rule = "Host(`a.example.com`,`b.example.com`)";

	assert_eq!(web.label("traefik.http.routers.web-8080.rule"), Some(rule));
	assert_eq!(
		web.label("traefik.http.routers.web-8080.priority"),
		Some((rule.len() + 100).to_string().as_str())
	);
	assert_eq!(
		web.label("traefik.http.routers.web-8080.entryPoints"),
		Some("https")
	);
	assert_eq!(
		web.label("traefik.http.services.web-8080.loadbalancer.server.port"),
		Some("8080")
	);
	assert_eq!(web.label("traefik.enable"), Some("true"));

	Ok(())
}

#[test]
fn wildcard_and_catch_all_hosts() -> AppResult {
	let mut cluster = cluster_with(vec![web_record()]);

	let mut services = run(&mut cluster, &["expose", "web", "8080", "-H", "a.example.com"])?;
	services[0].apply(&mut cluster)?;

	let mut services = run(&mut cluster, &["expose", "web", "8080", "-H", "*.example.com"])?;
	let rule = "HostRegexp(`a.example.com`,`{domain:.+}.example.com`)";

	{
		let web = find(&services, "web");
		assert_eq!(web.label("traefik.http.routers.web-8080.rule"), Some(rule));
		assert_eq!(
			web.label("traefik.http.routers.web-8080.priority"),
			Some(rule.len().to_string().as_str())
		);
	}

	services[0].apply(&mut cluster)?;

	let services = run(
		&mut cluster,
		&[
			"expose",
			"web",
			"8080",
			"--host-rm",
			"a.example.com",
			"--host-rm",
			"*.example.com",
		],
	)?;

	let route = Route::decode(find(&services, "web"), RouterProtocol::Http, "web-8080")?;
	assert_eq!(route.rule.encode(RouterProtocol::Http), "PathPrefix(`/`)");

	assert!(matches!(
		run(&mut cluster, &["expose", "web", "8080", "--host-rm", "b.example.com"]),
		Err(AppError::PreconditionFailed(_))
	));

	Ok(())
}

#[test]
fn tcp_routers_match_by_sni() -> AppResult {
	let mut cluster = cluster_with(vec![web_record()]);

	let services = run(
		&mut cluster,
		&[
			"expose",
			"web",
			"5432",
			"--tcp",
			"--tls",
			"--router",
			"db",
			"--entrypoint-add",
			"postgres",
			"-H",
			"db.example.com",
		],
	)?;

	let web = find(&services, "web");

	assert_eq!(
		web.label("traefik.tcp.routers.db.rule"),
		Some("HostSNI(`db.example.com`)")
	);
	assert_eq!(web.label("traefik.tcp.routers.db.entryPoints"), Some("postgres"));
	assert_eq!(web.label("traefik.tcp.routers.db.tls"), Some("true"));
	assert_eq!(web.label("traefik.tcp.routers.db.priority"), None);
	assert_eq!(
		web.label("traefik.tcp.services.db.loadbalancer.server.port"),
		Some("5432")
	);

	Ok(())
}

#[test]
fn opaque_rules_survive_other_edits() -> AppResult {
	let mut record = web_record();
	record.spec.labels = Some(btreemap! {
		"traefik.http.routers.web-80.rule".to_string() => "Host(`a.com`) && PathPrefix(`/api`)".to_string(),
		"traefik.http.routers.web-80.priority".to_string() => "5".to_string(),
	});

	let mut cluster = cluster_with(vec![record]);

	let services = run(&mut cluster, &["expose", "web", "80", "--https", "--lbswarm"])?;
	let web = find(&services, "web");

	assert_eq!(
		web.label("traefik.http.routers.web-80.rule"),
		Some("Host(`a.com`) && PathPrefix(`/api`)")
	);
	assert_eq!(web.label("traefik.http.routers.web-80.priority"), Some("5"));
	assert_eq!(
		web.label("traefik.http.services.web-80.loadbalancer.server.scheme"),
		Some("https")
	);
	assert_eq!(web.label("traefik.docker.lbswarm"), Some("true"));

	Ok(())
}

#[test]
fn unexpose_keeps_unrelated_labels() -> AppResult {
	let mut record = web_record();
	record.spec.labels = Some(btreemap! {
		"traefik.enable".to_string() => "true".to_string(),
		"traefik.http.routers.x.rule".to_string() => "PathPrefix(`/`)".to_string(),
		"traefikx".to_string() => "kept".to_string(),
	});

	let mut cluster = cluster_with(vec![record]);

	let services = run(&mut cluster, &["unexpose", "web"])?;

	assert_eq!(
		find(&services, "web").labels(),
		&btreemap! { "traefikx".to_string() => "kept".to_string() }
	);

	assert!(matches!(
		run(&mut cluster, &["unexpose", "api"]),
		Err(AppError::PreconditionFailed(_))
	));

	Ok(())
}

#[test]
fn service_env_and_args() -> AppResult {
	let mut cluster = cluster_with(vec![web_record()]);

	let services = run(
		&mut cluster,
		&[
			"service",
			"web",
			"--env-add",
			"TZ=UTC",
			"--arg-add",
			"log.level=INFO",
			"--arg-add",
			"debug",
		],
	)?;

	let web = find(&services, "web");

	assert_eq!(web.env("TZ"), Some("UTC"));
	assert_eq!(web.args().emit(), vec!["--log.level=INFO", "--debug"]);

	Ok(())
}

#[test]
fn forwarder_is_created_implicitly() -> AppResult {
	let mut cluster = cluster_with(Vec::new());

	let services = run(&mut cluster, &["forwarder", "forward", "10.0.0.5", "8080"])?;
	let forward = find(&services, "forward");

	assert!(!forward.is_created());
	assert_eq!(forward.image().to_string(), "alpine/socat");
	assert_eq!(
		forward.args().emit(),
		vec!["TCP4-LISTEN:8080,fork", "TCP4:10.0.0.5:8080"]
	);

	Ok(())
}
