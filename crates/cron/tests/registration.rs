#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{fs, sync::Arc};

use {
    async_trait::async_trait,
    autocron_cron::{
        AutoCrontabJob, CrontabStore, FileStore, JobOptions, Outcome, Registrar, ScheduledTask,
    },
    tempfile::TempDir,
};

struct Example;

#[async_trait]
impl ScheduledTask for Example {
    async fn run(&self) {}
}

#[tokio::test]
async fn register_then_reschedule_against_file_store() {
    let tmp = TempDir::new().unwrap();
    let script = tmp.path().join("example.sh");
    fs::write(&script, "#!/bin/sh\necho hi\n").unwrap();
    let crontab_path = tmp.path().join("crontab");
    fs::write(&crontab_path, "MAILTO=ops@example.com\n45 23 * * * /opt/unrelated.sh\n").unwrap();

    let store = Arc::new(FileStore::new(&crontab_path));
    let registrar = Registrar::new(Arc::clone(&store) as Arc<dyn CrontabStore>);

    let first = AutoCrontabJob::register(
        JobOptions::new("example", &script, "*/5 * * * *").with_interpreter("/bin/sh"),
        Example,
        &registrar,
    )
    .await
    .unwrap();
    assert_eq!(first.registration().outcome, Outcome::Inserted);

    let pattern = first.identity().fingerprint().pattern().unwrap();
    let before = store.load().unwrap();
    let matches = before.find_by_regex(&pattern);
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].minute, "*/5");
    let command = matches[0].command.clone();

    let second = AutoCrontabJob::register(
        JobOptions::new("example", &script, "0 * * * *").with_interpreter("/bin/sh"),
        Example,
        &registrar,
    )
    .await
    .unwrap();
    assert_eq!(second.identity(), first.identity());

    let after = store.load().unwrap();
    let matches = after.find_by_regex(&pattern);
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].minute, "0");
    assert_eq!(matches[0].command, command);

    let text = fs::read_to_string(&crontab_path).unwrap();
    assert!(text.starts_with("MAILTO=ops@example.com\n45 23 * * * /opt/unrelated.sh\n"));
    assert_eq!(after.len(), 2);

    assert_eq!(registrar.unregister(first.identity()).await.unwrap(), 1);
    assert_eq!(store.load().unwrap().len(), 1);
}
