#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};
    use timekeeper::libs::config::Config;
    use timekeeper::libs::error::Error;
    use timekeeper::libs::external::TaskView;
    use timekeeper::libs::listeners::StoreEvent;
    use timekeeper::libs::service::Timekeeper;

    struct TransferContext {
        temp_dir: TempDir,
        source: Timekeeper,
    }

    impl TransferContext {
        fn open(&self, name: &str) -> Timekeeper {
            let mut config = Config::with_database(self.temp_dir.path().join(name));
            config.local_uuid = Some("0000-test".to_string());
            Timekeeper::open(config).unwrap()
        }

        fn export_dir(&self) -> PathBuf {
            self.temp_dir.path().join("export")
        }
    }

    impl TestContext for TransferContext {
        fn setup() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            let mut config = Config::with_database(temp_dir.path().join("source.db"));
            config.local_uuid = Some("0000-test".to_string());
            let source = Timekeeper::open(config).unwrap();

            let first = source.get_or_link_task(&TaskView::local("1", "Finished work")).unwrap();
            source.start_activity_at(&first, at(14, 9, 0)).unwrap();
            source.end_activity(&first, Some(at(14, 12, 0)), false).unwrap();
            let running = source.get_or_link_task(&TaskView::local("2", "Still going").with_url("https://x/2")).unwrap();
            source.start_activity_at(&running, at(14, 13, 0)).unwrap();

            TransferContext { temp_dir, source }
        }

        fn teardown(self) {
            self.source.close();
        }
    }

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2016, 3, d).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn count(service: &Timekeeper, table: &str) -> i64 {
        service
            .with_unit_of_work(|uow| Ok(uow.conn().query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?))
            .unwrap()
    }

    #[test_context(TransferContext)]
    #[test]
    fn test_export_writes_three_files(ctx: &mut TransferContext) {
        let rows = ctx.source.export_to(&ctx.export_dir()).unwrap();
        // two tasks, two activities, two links
        assert_eq!(rows, 6);

        let tasks = fs::read_to_string(ctx.export_dir().join("trackedtask.csv")).unwrap();
        let mut lines = tasks.lines();
        assert_eq!(
            lines.next(),
            Some("repository_url,task_id,task_project,task_url,task_summary,current_activity_id")
        );
        assert_eq!(lines.count(), 2);
        assert!(ctx.export_dir().join("activity.csv").is_file());
        assert!(ctx.export_dir().join("trackedtask_activity.csv").is_file());
        assert!(!ctx.export_dir().join("activity.csv.tmp").exists());
    }

    #[test_context(TransferContext)]
    #[test]
    fn test_round_trip_into_empty_store(ctx: &mut TransferContext) {
        ctx.source.export_to(&ctx.export_dir()).unwrap();

        let target = ctx.open("target.db");
        assert_eq!(target.import_from(&ctx.export_dir()).unwrap(), 6);

        let first = target.find_task(&TaskView::local("1", "Finished work")).unwrap().unwrap();
        let first = first.lock().clone();
        assert_eq!(first.activities().len(), 1);
        assert_eq!(first.activities()[0].start, at(14, 9, 0));
        assert_eq!(first.activities()[0].end, Some(at(14, 12, 0)));
        assert!(!first.is_active());

        let running = target.find_task(&TaskView::local("2", "Still going").with_url("https://x/2")).unwrap().unwrap();
        let running = running.lock().clone();
        assert_eq!(running.url.as_deref(), Some("https://x/2"));
        assert_eq!(running.current_activity().map(|a| a.start), Some(at(14, 13, 0)));

        target.close();
    }

    #[test_context(TransferContext)]
    #[test]
    fn test_reexport_matches_original_files(ctx: &mut TransferContext) {
        ctx.source.export_to(&ctx.export_dir()).unwrap();
        let target = ctx.open("target.db");
        target.import_from(&ctx.export_dir()).unwrap();

        let again = ctx.temp_dir.path().join("again");
        assert_eq!(target.export_to(&again).unwrap(), 6);
        for file in ["trackedtask.csv", "activity.csv", "trackedtask_activity.csv"] {
            let original = fs::read(ctx.export_dir().join(file)).unwrap();
            let copied = fs::read(again.join(file)).unwrap();
            assert_eq!(original, copied, "{file} differs after the round trip");
        }
        target.close();
    }

    #[test_context(TransferContext)]
    #[test]
    fn test_unreadable_cached_task_does_not_fail_import(ctx: &mut TransferContext) {
        let cached = ctx.source.find_task(&TaskView::local("1", "Finished work")).unwrap().unwrap();
        ctx.source.export_to(&ctx.export_dir()).unwrap();

        // the stored start time no longer parses, so reloading the cached task fails
        let path = ctx.export_dir().join("activity.csv");
        let edited = fs::read_to_string(&path).unwrap().replacen("2016-03-14 09:00:00", "14.03.2016 09:00", 1);
        fs::write(&path, edited).unwrap();

        let events = Arc::new(AtomicUsize::new(0));
        let seen = events.clone();
        ctx.source.add_listener(Arc::new(move |event: StoreEvent| {
            if event == StoreEvent::Imported {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        }));

        assert_eq!(ctx.source.import_from(&ctx.export_dir()).unwrap(), 6);
        assert_eq!(events.load(Ordering::SeqCst), 1);
        assert_eq!(cached.lock().activities()[0].start, at(14, 9, 0));
    }

    #[test_context(TransferContext)]
    #[test]
    fn test_import_merges_and_refreshes_cached_tasks(ctx: &mut TransferContext) {
        let cached = ctx.source.find_task(&TaskView::local("1", "Finished work")).unwrap().unwrap();
        ctx.source.export_to(&ctx.export_dir()).unwrap();

        let path = ctx.export_dir().join("trackedtask.csv");
        let edited = fs::read_to_string(&path).unwrap().replace("Finished work", "Renamed work");
        fs::write(&path, edited).unwrap();

        let events = Arc::new(AtomicUsize::new(0));
        let seen = events.clone();
        ctx.source.add_listener(Arc::new(move |event: StoreEvent| {
            if event == StoreEvent::Imported {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        }));

        ctx.source.import_from(&ctx.export_dir()).unwrap();
        assert_eq!(cached.lock().summary, "Renamed work");
        assert_eq!(count(&ctx.source, "activity"), 2);
        assert_eq!(events.load(Ordering::SeqCst), 1);
    }

    #[test_context(TransferContext)]
    #[test]
    fn test_missing_input_file_changes_nothing(ctx: &mut TransferContext) {
        ctx.source.export_to(&ctx.export_dir()).unwrap();
        fs::remove_file(ctx.export_dir().join("activity.csv")).unwrap();

        let target = ctx.open("target.db");
        let err = target.import_from(&ctx.export_dir()).unwrap_err();
        assert!(matches!(err, Error::MissingInputFile(ref file) if file == "activity.csv"));
        assert_eq!(count(&target, "trackedtask"), 0);
        target.close();
    }

    #[test_context(TransferContext)]
    #[test]
    fn test_malformed_import_rolls_back(ctx: &mut TransferContext) {
        ctx.source.export_to(&ctx.export_dir()).unwrap();
        let path = ctx.export_dir().join("trackedtask_activity.csv");
        let mut links = fs::read_to_string(&path).unwrap();
        links.push_str("local-0000-test,2,not-a-number\n");
        fs::write(&path, links).unwrap();

        let target = ctx.open("target.db");
        let err = target.import_from(&ctx.export_dir()).unwrap_err();
        assert!(matches!(err.cause(), Error::MalformedInput { .. }));
        assert_eq!(count(&target, "trackedtask"), 0);
        assert_eq!(count(&target, "activity"), 0);
        target.close();
    }

    #[test_context(TransferContext)]
    #[test]
    fn test_dangling_reference_is_rejected(ctx: &mut TransferContext) {
        ctx.source.export_to(&ctx.export_dir()).unwrap();
        let path = ctx.export_dir().join("activity.csv");
        let mut activities = fs::read_to_string(&path).unwrap();
        activities.push_str("99,local-0000-test,missing,2016-03-14 09:00:00,,,\n");
        fs::write(&path, activities).unwrap();

        let target = ctx.open("target.db");
        let err = target.import_from(&ctx.export_dir()).unwrap_err();
        assert!(matches!(err.cause(), Error::MalformedInput { .. }));
        assert_eq!(count(&target, "activity"), 0);
        target.close();
    }

    #[test_context(TransferContext)]
    #[test]
    fn test_wrong_header_is_malformed(ctx: &mut TransferContext) {
        ctx.source.export_to(&ctx.export_dir()).unwrap();
        fs::write(ctx.export_dir().join("trackedtask_activity.csv"), "a,b,c\n").unwrap();

        let err = ctx.source.import_from(&ctx.export_dir()).unwrap_err();
        assert!(matches!(err.cause(), Error::MalformedInput { file, .. } if file == "trackedtask_activity.csv"));
    }
}
