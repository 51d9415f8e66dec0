#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;
    use test_context::{test_context, TestContext};
    use timekeeper::db::session::Entity;
    use timekeeper::libs::config::Config;
    use timekeeper::libs::error::Error;
    use timekeeper::libs::external::TaskView;
    use timekeeper::libs::project::UNDETERMINED_PROJECT;
    use timekeeper::libs::task::{Task, TaskLinkStatus};
    use timekeeper::libs::service::{now, Timekeeper};

    struct ServiceContext {
        temp_dir: TempDir,
        service: Timekeeper,
    }

    impl ServiceContext {
        fn config(&self) -> Config {
            let mut config = Config::with_database(self.temp_dir.path().join("timekeeper.db"));
            config.local_uuid = Some("0000-test".to_string());
            config.repositories = vec!["https://bugs.example.org".to_string()];
            config
        }

        fn reopen(&self) -> Timekeeper {
            Timekeeper::open(self.config()).unwrap()
        }
    }

    impl TestContext for ServiceContext {
        fn setup() -> Self {
            let temp_dir = tempfile::tempdir().unwrap();
            let mut config = Config::with_database(temp_dir.path().join("timekeeper.db"));
            config.local_uuid = Some("0000-test".to_string());
            config.repositories = vec!["https://bugs.example.org".to_string()];
            let service = Timekeeper::open(config).unwrap();
            ServiceContext { temp_dir, service }
        }

        fn teardown(self) {
            self.service.close();
        }
    }

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2016, 3, d).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    #[test_context(ServiceContext)]
    #[test]
    fn test_get_or_link_creates_task_once(ctx: &mut ServiceContext) {
        let view = TaskView::new("https://bugs.example.org", "42", "Fix the parser").with_project("parser");
        let first = ctx.service.get_or_link_task(&view).unwrap();
        let second = ctx.service.get_or_link_task(&view).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let task = first.lock().clone();
        assert_eq!(task.summary, "Fix the parser");
        assert_eq!(task.project.as_ref().map(|p| p.title.as_str()), Some("parser"));
        assert_eq!(task.link_status, TaskLinkStatus::Linked);
        assert_eq!(ctx.service.list_all_tasks().unwrap().len(), 1);
    }

    #[test_context(ServiceContext)]
    #[test]
    fn test_local_tasks_carry_installation_uuid(ctx: &mut ServiceContext) {
        let view = TaskView::local("7", "Write notes");
        let task = ctx.service.get_or_link_task(&view).unwrap();
        let task = task.lock();
        assert_eq!(task.id.repository_url, "local-0000-test");
        assert_eq!(task.id.task_id, "7");
        assert_eq!(task.link_status, TaskLinkStatus::Unlinked);
        assert_eq!(task.project.as_ref().map(|p| p.title.as_str()), Some(UNDETERMINED_PROJECT));
    }

    #[test_context(ServiceContext)]
    #[test]
    fn test_summary_follows_external_task(ctx: &mut ServiceContext) {
        ctx.service.get_or_link_task(&TaskView::local("1", "Old title")).unwrap();
        let task = ctx.service.find_task(&TaskView::local("1", "New title")).unwrap().unwrap();
        assert_eq!(task.lock().summary, "New title");

        let reopened = ctx.reopen();
        let id = task.lock().id.clone();
        let stored = reopened.with_unit_of_work(|uow| Task::find(uow, &id)).unwrap().unwrap();
        assert_eq!(stored.summary, "New title");
        reopened.close();
    }

    #[test_context(ServiceContext)]
    #[test]
    fn test_find_unknown_task(ctx: &mut ServiceContext) {
        assert!(ctx.service.find_task(&TaskView::local("404", "Missing")).unwrap().is_none());
    }

    #[test_context(ServiceContext)]
    #[test]
    fn test_create_existing_task_conflicts(ctx: &mut ServiceContext) {
        let view = TaskView::local("1", "Once");
        ctx.service.create_task(&view).unwrap();
        let err = ctx.service.create_task(&view).unwrap_err();
        assert!(err.is_conflict());
        assert!(matches!(err, Error::TransactionFailure(_)));
    }

    #[test_context(ServiceContext)]
    #[test]
    fn test_start_and_end_activity(ctx: &mut ServiceContext) {
        let task = ctx.service.get_or_link_task(&TaskView::local("1", "Work")).unwrap();

        let started = ctx.service.start_activity_at(&task, at(14, 9, 0)).unwrap();
        assert!(started.id.is_some());
        assert!(task.lock().is_active());

        let again = ctx.service.start_activity_at(&task, at(14, 9, 30)).unwrap();
        assert_eq!(again.id, started.id);
        assert_eq!(again.start, at(14, 9, 0));

        let ended = ctx.service.end_activity(&task, Some(at(14, 11, 0)), false).unwrap().unwrap();
        assert_eq!(ended.end, Some(at(14, 11, 0)));
        assert!(!task.lock().is_active());

        assert!(ctx.service.end_activity(&task, Some(at(14, 12, 0)), false).unwrap().is_none());

        let reopened = ctx.reopen();
        let stored = reopened.find_task(&TaskView::local("1", "Work")).unwrap().unwrap();
        let stored = stored.lock();
        assert_eq!(stored.activities().len(), 1);
        assert_eq!(stored.activities()[0].end, Some(at(14, 11, 0)));
        assert!(stored.current_activity().is_none());
        drop(stored);
        reopened.close();
    }

    #[test_context(ServiceContext)]
    #[test]
    fn test_reactivate_splits_activity(ctx: &mut ServiceContext) {
        let task = ctx.service.get_or_link_task(&TaskView::local("1", "Work")).unwrap();
        ctx.service.start_activity_at(&task, at(14, 9, 0)).unwrap();
        ctx.service.end_activity(&task, Some(at(14, 10, 0)), true).unwrap().unwrap();

        let task = task.lock();
        assert_eq!(task.activities().len(), 2);
        let current = task.current_activity().unwrap();
        assert_eq!(current.start, at(14, 10, 0));
        assert!(current.id.is_some());
    }

    #[test_context(ServiceContext)]
    #[test]
    fn test_end_before_start_leaves_task_untouched(ctx: &mut ServiceContext) {
        let task = ctx.service.get_or_link_task(&TaskView::local("1", "Work")).unwrap();
        ctx.service.start_activity_at(&task, at(14, 9, 0)).unwrap();

        let err = ctx.service.end_activity(&task, Some(at(14, 8, 0)), false).unwrap_err();
        assert!(matches!(err, Error::InvalidInterval { .. }));
        let task = task.lock();
        assert!(task.is_active());
        assert!(task.current_activity().unwrap().end.is_none());
    }

    #[test_context(ServiceContext)]
    #[test]
    fn test_end_now_after_clock_went_back(ctx: &mut ServiceContext) {
        // an activity started "later" than the clock now reads, as after a
        // daylight saving fall-back
        let started = now() + Duration::minutes(40);
        let task = ctx.service.get_or_link_task(&TaskView::local("1", "Night shift")).unwrap();
        ctx.service.start_activity_at(&task, started).unwrap();

        let ended = ctx.service.end_activity(&task, None, false).unwrap().unwrap();
        assert_eq!(ended.end, Some(started));
        assert_eq!(ended.duration(now()), Duration::zero());
        assert!(!task.lock().is_active());
    }

    #[test_context(ServiceContext)]
    #[test]
    fn test_end_defaults_to_now(ctx: &mut ServiceContext) {
        let task = ctx.service.get_or_link_task(&TaskView::local("1", "Work")).unwrap();
        let started = now() - Duration::hours(1);
        ctx.service.start_activity_at(&task, started).unwrap();

        let before = now();
        let ended = ctx.service.end_activity(&task, None, false).unwrap().unwrap();
        let end = ended.end.unwrap();
        assert!(end >= before && end <= now());
    }

    #[test_context(ServiceContext)]
    #[test]
    fn test_clean_up_left_open_activity(ctx: &mut ServiceContext) {
        let view = TaskView::local("1", "Work");
        let task = ctx.service.get_or_link_task(&view).unwrap();
        ctx.service.start_activity_at(&task, at(14, 9, 0)).unwrap();

        // Busy for the first hour, idle afterwards.
        let busy_until = at(14, 10, 0);
        let elapsed = |from: NaiveDateTime, _to: NaiveDateTime| {
            if from < busy_until {
                chrono::Duration::minutes(30)
            } else {
                chrono::Duration::zero()
            }
        };

        assert!(ctx.service.clean_up_task(&task, &view.clone().active(true), at(14, 17, 0), elapsed).unwrap().is_none());

        let closed = ctx.service.clean_up_task(&task, &view, at(14, 17, 0), elapsed).unwrap().unwrap();
        assert_eq!(closed.end, Some(at(14, 10, 30)));
        assert!(!task.lock().is_active());
    }

    #[test_context(ServiceContext)]
    #[test]
    fn test_annotate_activity_adds_label(ctx: &mut ServiceContext) {
        let task = ctx.service.get_or_link_task(&TaskView::local("1", "Work")).unwrap();
        let activity = ctx.service.start_activity_at(&task, at(14, 9, 0)).unwrap();
        let id = activity.id.unwrap();

        let annotated = ctx
            .service
            .annotate_activity(&task, id, Some("review".to_string()), Some("PR 12".to_string()))
            .unwrap();
        assert_eq!(annotated.label.as_deref(), Some("review"));
        assert_eq!(ctx.service.list_labels().unwrap().len(), 1);

        let err = ctx.service.annotate_activity(&task, id + 100, None, None).unwrap_err();
        assert!(matches!(err, Error::ActivityNotFound(_)));
    }

    #[test_context(ServiceContext)]
    #[test]
    fn test_concurrent_start_keeps_one_open_activity(ctx: &mut ServiceContext) {
        let workers: Vec<_> = (0..8)
            .map(|i| {
                let service = ctx.service.clone();
                thread::spawn(move || {
                    let task = service.get_or_link_task(&TaskView::local("1", "Shared")).unwrap();
                    service.start_activity_at(&task, at(14, 9, i)).unwrap();
                    service.release_worker();
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let reopened = ctx.reopen();
        let task = reopened.find_task(&TaskView::local("1", "Shared")).unwrap().unwrap();
        let task = task.lock();
        assert_eq!(task.activities().len(), 1);
        assert!(task.current_activity().is_some());
        drop(task);
        reopened.close();
    }

    #[test_context(ServiceContext)]
    #[test]
    fn test_concurrent_end_closes_activity_once(ctx: &mut ServiceContext) {
        let task = ctx.service.get_or_link_task(&TaskView::local("1", "Shared")).unwrap();
        ctx.service.start_activity_at(&task, at(14, 9, 0)).unwrap();

        let workers: Vec<_> = (0..8)
            .map(|i| {
                let service = ctx.service.clone();
                let task = task.clone();
                thread::spawn(move || service.end_activity(&task, Some(at(14, 10, i)), false).unwrap())
            })
            .collect();
        let closed: Vec<_> = workers.into_iter().filter_map(|w| w.join().unwrap()).collect();
        assert_eq!(closed.len(), 1);
        assert!(!task.lock().is_active());

        let (rows, closed_rows, current): (i64, i64, Option<i64>) = ctx
            .service
            .with_unit_of_work(|uow| {
                let conn = uow.conn();
                Ok((
                    conn.query_row("SELECT COUNT(*) FROM activity", [], |r| r.get(0))?,
                    conn.query_row("SELECT COUNT(*) FROM activity WHERE end_time IS NOT NULL", [], |r| r.get(0))?,
                    conn.query_row("SELECT current_activity_id FROM trackedtask", [], |r| r.get(0))?,
                ))
            })
            .unwrap();
        assert_eq!((rows, closed_rows, current), (1, 1, None));
        assert_eq!(task.lock().activities()[0].end, closed[0].end);
    }

    #[test]
    fn test_local_ids_survive_restart_without_configured_uuid() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("timekeeper.db");
        let view = TaskView::local("1", "Unconfigured");

        let first = Timekeeper::open(Config::with_database(path.clone())).unwrap();
        let task = first.get_or_link_task(&view).unwrap();
        first.start_activity_at(&task, at(14, 9, 0)).unwrap();
        let id = task.lock().id.clone();
        let uuid = first.local_uuid().unwrap().to_string();
        assert_eq!(id.repository_url, format!("local-{uuid}"));
        first.close();

        let second = Timekeeper::open(Config::with_database(path)).unwrap();
        assert_eq!(second.local_uuid(), Some(uuid.as_str()));
        let found = second.find_task(&view).unwrap().unwrap();
        let found = found.lock().clone();
        assert_eq!(found.id, id);
        assert!(found.is_active());
        second.close();
    }

    #[test_context(ServiceContext)]
    #[test]
    fn test_delete_task_cascades(ctx: &mut ServiceContext) {
        let task = ctx.service.get_or_link_task(&TaskView::local("1", "Doomed")).unwrap();
        ctx.service.start_activity_at(&task, at(14, 9, 0)).unwrap();
        assert!(ctx.service.delete_task(&task).unwrap());

        let (activities, links): (i64, i64) = ctx
            .service
            .with_unit_of_work(|uow| {
                let conn = uow.conn();
                Ok((
                    conn.query_row("SELECT COUNT(*) FROM activity", [], |r| r.get(0))?,
                    conn.query_row("SELECT COUNT(*) FROM trackedtask_activity", [], |r| r.get(0))?,
                ))
            })
            .unwrap();
        assert_eq!((activities, links), (0, 0));
        assert!(ctx.service.list_all_tasks().unwrap().is_empty());
    }

    #[test_context(ServiceContext)]
    #[test]
    fn test_closed_service_rejects_requests(ctx: &mut ServiceContext) {
        ctx.service.close();
        ctx.service.close();
        let err = ctx.service.list_all_tasks().unwrap_err();
        assert!(matches!(err, Error::Closed));
    }
}
