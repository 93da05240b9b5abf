use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use cluster_data::cluster::{ClusterRules, Summary};
use cluster_data::job::Severity;
use cluster_data::query::{ClusterQuery, OutputLines, RemoteShell};
use cluster_data::schema::{JobField, Schema};
use color_eyre::{
    eyre::{eyre, OptionExt as _},
    Result,
};

/// Answers by command prefix, like a head node running sinfo/ps/squeue would.
struct HeadNode {
    outputs: HashMap<&'static str, Vec<&'static str>>,
}

impl RemoteShell for HeadNode {
    fn exec(&self, _host: &str, command: &str) -> Result<OutputLines> {
        let tool = command
            .split_whitespace()
            .next()
            .ok_or_else(|| eyre!("empty command"))?;
        let lines = self.outputs.get(tool).cloned().unwrap_or_default();
        Ok(Box::new(lines.into_iter().map(String::from)))
    }
}

fn now() -> Result<NaiveDateTime> {
    NaiveDate::from_ymd_opt(2024, 10, 14)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .ok_or_eyre("invalid date")
}

fn query(job_schema: Schema<JobField>) -> ClusterQuery {
    ClusterQuery {
        hosts: vec!["cluster58".to_owned()],
        node_schema: Schema::default(),
        job_schema,
        session_filter: "[s]run.*--pty".to_owned(),
    }
}

#[test_log::test]
fn single_node_half_used() -> Result<()> {
    let shell = HeadNode {
        outputs: HashMap::from([
            ("sinfo", vec!["guppy1\tgpu:4\t32\tmix\ttxp\tnone"]),
            ("ps", vec![]),
            (
                "squeue",
                vec!["alice\tgpu:2\t8\tguppy1\t12:34\t100\t2024-10-14T11:47:26\tpython train.py"],
            ),
        ]),
    };
    let cluster = query(Schema::default()).collect(&shell, ClusterRules::default(), now()?);

    assert_eq!(
        cluster.summary(),
        Summary {
            total_gpus: 4,
            total_used: 2,
            usage_rate: 50
        }
    );
    let alice = cluster.user("alice").ok_or_eyre("alice missing")?;
    assert_eq!(alice.gpu_used(), 2);
    assert_eq!(alice.jobs().len(), 1);
    Ok(())
}

#[test_log::test]
fn busy_cluster() -> Result<()> {
    let shell = HeadNode {
        outputs: HashMap::from([
            (
                "sinfo",
                vec![
                    "guppy[1-3]\tgpu:txp:4\t32+\tmix\ttxp\tnone",
                    "guppy10\tgpu:txp:4\t32\tidle\ttxp\tnone",
                    "guppy4\tgpu:txp:4\t32\tdown*\ttxp\tNot responding",
                    "login\t(null)\t8\tidle\t(null)\tnone",
                ],
            ),
            (
                "ps",
                vec![
                    "alice    Mon Oct 14 09:00:00 2024 srun --pty bash",
                    "dave     Mon Oct 14 11:30:00 2024 srun --pty bash",
                ],
            ),
            (
                "squeue",
                vec![
                    "alice\tgpu:1\t4\tguppy1\t3:00:00\t1\t2024-10-14T09:00:00\tbash",
                    "bob\tgpu:txp:4\t16\tguppy2\t1-02:00:00\t2\t2024-10-13T10:00:00\tpython a.py",
                    "bob\tgpu:txp:2\t8\tguppy3\t10:00\t3\t2024-10-14T11:50:00\tpython b.py",
                    "carol\t(null)\t2\tguppy3\t5:00\t4\t2024-10-14T11:55:00\tmake",
                    "dave\tgpu:1\t2\tguppy10\t30:00\t5\t2024-10-14T11:30:00\tbash",
                    "erin\tgpu:1\t2\tguppy77\t1:00\t6\tN/A\tpython c.py",
                    "frank\tgpu:1\t2\t\t0:00\t7\tN/A\tpython d.py",
                    "not a job line",
                ],
            ),
        ]),
    };
    let cluster = query(Schema::default()).collect(&shell, ClusterRules::default(), now()?);

    // guppy77 is only known from the queue
    assert_eq!(cluster.jobs().len(), 6);
    let ghost = cluster.node("guppy77").ok_or_eyre("placeholder missing")?;
    assert_eq!((ghost.gpus, ghost.gpu_used()), (0, 1));

    let order = cluster
        .display_nodes()
        .iter()
        .map(|node| node.name.to_string())
        .collect::<Vec<_>>();
    assert_eq!(order, ["guppy1", "guppy2", "guppy3", "guppy10", "guppy4"]);

    // 16 GPUs up, 1 + 4 + 2 + 1 used
    assert_eq!(cluster.summary().total_gpus, 16);
    assert_eq!(cluster.summary().total_used, 8);
    assert_eq!(cluster.summary().usage_rate, 50);

    let bob = cluster.user("bob").ok_or_eyre("bob missing")?;
    assert!(bob.is_overusing());
    let carol_job = &cluster.jobs()[3];
    let guppy3 = cluster.node("guppy3").ok_or_eyre("guppy3 missing")?;
    assert_eq!(guppy3.cpu_jobs().len(), 1);
    assert_eq!(guppy3.gpu_jobs().len(), 2);
    assert_eq!(cluster.severity(carol_job), Severity::Normal);

    let severities = cluster
        .jobs()
        .iter()
        .map(|job| (job.id.as_str(), job.interactive, cluster.severity(job)))
        .collect::<Vec<_>>();
    assert_eq!(
        severities,
        [
            ("1", true, Severity::LongInteractive),
            ("2", false, Severity::Overusing),
            ("3", false, Severity::Overusing),
            ("4", false, Severity::Normal),
            ("5", true, Severity::Normal),
            ("6", false, Severity::Normal),
        ]
    );
    Ok(())
}

#[test]
fn reordered_job_columns() -> Result<()> {
    use JobField::*;
    let schema = Schema::new(vec![JobId, User, NodeList, TresPerNode, Cpus, Elapsed, StartTime, Command])?;
    let shell = HeadNode {
        outputs: HashMap::from([
            ("sinfo", vec!["guppy1\tgpu:4\t32\tidle\ttxp\tnone"]),
            (
                "squeue",
                vec!["9\talice\tguppy1\tgpu:3\t4\t10:00\t2024-10-14T11:50:00\tpython x.py"],
            ),
        ]),
    };
    let cluster = query(schema).collect(&shell, ClusterRules::default(), now()?);
    assert_eq!(cluster.summary().total_used, 3);
    assert_eq!(cluster.jobs()[0].id, "9");
    Ok(())
}

#[test]
fn unreachable_head_node_gives_empty_cluster() -> Result<()> {
    struct Unreachable;
    impl RemoteShell for Unreachable {
        fn exec(&self, host: &str, _command: &str) -> Result<OutputLines> {
            Err(eyre!("ssh: connect to host {host} port 22: No route to host"))
        }
    }
    let cluster = query(Schema::default()).collect(&Unreachable, ClusterRules::default(), now()?);
    assert!(cluster.jobs().is_empty());
    assert_eq!(cluster.summary().usage_rate, 0);
    Ok(())
}
