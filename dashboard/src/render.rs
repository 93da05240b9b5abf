use std::io::Write as _;
use std::path::Path;

use chrono::NaiveDateTime;
use cluster_data::cluster::{Cluster, Summary};
use cluster_data::job::{Job, JobRef};
use cluster_data::node::Node;
use cluster_data::slurm::SlurmUser;
use color_eyre::eyre::Context as _;
use color_eyre::Result;
use itertools::Itertools as _;
use maud::{html, Markup, PreEscaped, DOCTYPE};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

const TITLE: &str = "GPU Cluster Usage";
const UPDATED_FMT: &str = "%Y-%m-%d %H:%M:%S";

const STYLE: &str = r#"
body { font-family: sans-serif; margin: 2em; color: #222; }
table { border-collapse: collapse; margin-bottom: 2em; }
th, td { padding: 0.2em 0.6em; text-align: left; border-bottom: 1px solid #ddd; }
.usage-bar { width: 30em; height: 1.2em; background: #eee; border: 1px solid #aaa; }
.usage-bar div { height: 100%; background: #4a8; }
.gpus { display: flex; gap: 2px; }
.gpu { width: 6em; height: 1.6em; line-height: 1.6em; overflow: hidden; font-size: 0.8em; text-align: center; border: 1px solid #999; }
.gpu.free { background: #fff; border-style: dashed; }
.overusing { outline: 2px solid #d22; }
.long-interactive { outline: 2px dashed #e80; }
tr.unavailable { color: #999; }
td.message { font-style: italic; }
.updated { color: #777; font-size: 0.8em; }
"#;

/// Stable pastel colour per user.
fn user_color(user: &SlurmUser) -> String {
    // FNV-1a
    let hash = user
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(0x100_0000_01b3));
    format!("hsl({}, 60%, 78%)", hash % 360)
}

pub fn page(cluster: &Cluster, updated: NaiveDateTime, refresh_seconds: u32) -> Markup {
    let summary = cluster.summary();
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta http-equiv="refresh" content=(refresh_seconds);
                title { (TITLE) }
                style { (PreEscaped(STYLE)) }
            }
            body {
                h1 { (TITLE) }
                (summary_section(&summary))
                (node_table(cluster, &cluster.display_nodes()))
                (user_table(cluster))
                (job_table(cluster))
                p.updated { "Last updated " (updated.format(UPDATED_FMT).to_string()) }
            }
        }
    }
}

fn summary_section(summary: &Summary) -> Markup {
    html! {
        section.summary {
            p {
                strong { (summary.total_used) " / " (summary.total_gpus) }
                " GPUs in use (" (summary.usage_rate) "%)"
            }
            div.usage-bar {
                div style=(format!("width: {}%", summary.usage_rate.min(100))) {}
            }
        }
    }
}

fn gpu_cell(cluster: &Cluster, job: &Job) -> Markup {
    html! {
        div.gpu.(cluster.severity(job).label())
            style=(format!("background-color: {}", user_color(&job.user)))
            title=(cluster.job_tooltip(job)) {
            (job.user.as_str())
        }
    }
}

fn jobs_of<'a>(cluster: &'a Cluster, refs: &'a [JobRef]) -> impl Iterator<Item = &'a Job> + 'a {
    refs.iter().filter_map(|job| cluster.job(*job))
}

fn node_table(cluster: &Cluster, nodes: &[&Node]) -> Markup {
    html! {
        h2 { "Nodes" }
        table.nodes {
            thead {
                tr { th { "Node" } th { "Type" } th { "State" } th { "GPUs" } th { "CPU jobs" } th { "" } }
            }
            tbody {
                @for node in nodes {
                    tr.unavailable[!node.is_up()] {
                        td { (node.name.as_str()) }
                        td { (node.kind) }
                        td title=(node.raw_state) { (node.state.label()) }
                        td {
                            div.gpus {
                                @for job in jobs_of(cluster, node.gpu_jobs()) {
                                    (gpu_cell(cluster, job))
                                }
                                @for _ in 0..node.gpu_free() {
                                    div.gpu.free title="free" {}
                                }
                            }
                        }
                        td {
                            (jobs_of(cluster, node.cpu_jobs()).map(|job| job.user.as_str()).join(", "))
                        }
                        td.message {
                            @if !node.is_up() {
                                (node.message)
                            }
                        }
                    }
                }
            }
        }
    }
}

fn user_table(cluster: &Cluster) -> Markup {
    html! {
        h2 { "Users" }
        table.users {
            thead {
                tr { th { "User" } th { "GPUs" } th { "Jobs" } }
            }
            tbody {
                @for user in cluster.users().sorted_by_key(|user| std::cmp::Reverse(user.gpu_used())) {
                    tr.overusing[user.is_overusing()] title=(user.tooltip()) {
                        td style=(format!("background-color: {}", user_color(&user.name))) { (user.name.as_str()) }
                        td { (user.gpu_used()) }
                        td { (user.jobs().len()) }
                    }
                }
            }
        }
    }
}

fn job_table(cluster: &Cluster) -> Markup {
    html! {
        h2 { "Jobs" }
        table.jobs {
            thead {
                tr {
                    th { "Job" } th { "User" } th { "Node" } th { "GPUs" } th { "CPUs" }
                    th { "Elapsed" } th { "Command" }
                }
            }
            tbody {
                @for job in cluster.jobs() {
                    tr.(cluster.severity(job).label()) title=(cluster.job_tooltip(job)) {
                        td { (job.id) }
                        td { (job.user.as_str()) }
                        td { (job.node.as_str()) }
                        td { (job.gpus) }
                        td { (job.cpus) }
                        td { (job.elapsed.as_str()) }
                        td {
                            code { (job.command) }
                            @if job.interactive { " (interactive)" }
                        }
                    }
                }
            }
        }
        p.legend {
            span.overusing { "user over the GPU quota" } " "
            span.long-interactive { "interactive session open for 2 hours or more" }
        }
    }
}

/// Replace `path` with `page`. The page is written next to its destination first, so readers
/// only ever see a complete document and a failed run leaves the previous one in place.
#[instrument(skip(page))]
pub fn write_report(path: &Path, page: Markup) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir).wrap_err_with(|| format!("creating temporary file in {dir:?}"))?;
    file.write_all(page.into_string().as_bytes())
        .wrap_err("writing page")?;

    // served by a web server, temp files start out private
    #[cfg(unix)]
    {
        use std::fs::Permissions;
        use std::os::unix::fs::PermissionsExt as _;
        file.as_file()
            .set_permissions(Permissions::from_mode(0o644))
            .wrap_err("setting page permissions")?;
    }

    file.persist(path).wrap_err_with(|| format!("moving page to {path:?}"))?;
    debug!("page replaced");
    Ok(())
}

#[allow(non_snake_case)]
#[cfg(test)]
mod test {
    use std::collections::{BTreeMap, HashSet};

    use chrono::NaiveDate;
    use cluster_data::cluster::ClusterRules;
    use cluster_data::job::{Elapsed, JobSpec};
    use cluster_data::node::parse_inventory;
    use cluster_data::schema::Schema;
    use color_eyre::eyre::OptionExt as _;

    use super::*;

    fn now() -> Result<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2024, 10, 14)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .ok_or_eyre("invalid date")
    }

    fn cluster() -> Result<Cluster> {
        let nodes = parse_inventory(
            [
                "guppy1\tgpu:4\t32\tmix\ttxp\tnone",
                "guppy2\tgpu:2\t32\tdown\ttxp\tbroken <fan>",
            ],
            &Schema::default(),
        );
        let mut cluster = Cluster::new(ClusterRules::default(), nodes);
        cluster.add_job(
            JobSpec {
                id: "42".into(),
                user: "alice".into(),
                node: "guppy1".into(),
                gpus: 2,
                cpus: 4,
                elapsed: Elapsed("12:34".into()),
                started: now()?,
                command: "python train.py".into(),
            },
            &HashSet::new(),
        );
        Ok(cluster)
    }

    #[test]
    fn page__summary_and_cells() -> Result<()> {
        let html = page(&cluster()?, now()?, 60).into_string();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("GPUs in use (50%)"), "{html}");
        assert_eq!(html.matches(r#"class="gpu normal""#).count(), 2);
        // 2 free on guppy1, 2 on the broken guppy2
        assert_eq!(html.matches(r#"class="gpu free""#).count(), 4);
        assert!(html.contains("Last updated 2024-10-14 12:00:00"));
        Ok(())
    }

    #[test]
    fn page__escapes_scheduler_text() -> Result<()> {
        let html = page(&cluster()?, now()?, 60).into_string();
        assert!(html.contains("broken &lt;fan&gt;"));
        assert!(!html.contains("<fan>"));
        Ok(())
    }

    #[test]
    fn page__empty_cluster() -> Result<()> {
        let empty = Cluster::new(ClusterRules::default(), BTreeMap::new());
        let html = page(&empty, now()?, 60).into_string();
        assert!(html.contains("0 / 0"));
        assert!(html.contains("GPUs in use (0%)"));
        Ok(())
    }

    #[test]
    fn user_color__stable() {
        let alice = SlurmUser::from("alice");
        assert_eq!(user_color(&alice), user_color(&alice.clone()));
        assert!(user_color(&alice).starts_with("hsl("));
    }

    #[test]
    fn write_report__replaces_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("index.html");
        std::fs::write(&path, "old")?;

        write_report(&path, page(&cluster()?, now()?, 60))?;
        let written = std::fs::read_to_string(&path)?;
        assert!(written.contains("guppy1"));

        // only the page itself is left behind
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn write_report__missing_directory_keeps_nothing() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("missing").join("index.html");
        assert!(write_report(&path, page(&cluster()?, now()?, 60)).is_err());
        assert!(!path.exists());
        Ok(())
    }
}
