use anyhow::Result;
use taskcache::Application;
use taskcache_config::AppConfig;
use taskcache_domain::entities::{NewTask, Task};

fn embedded_config() -> AppConfig {
    AppConfig::from_toml(
        r#"
        [database]
        url = "sqlite::memory:"
        max_connections = 1
        min_connections = 1
        connection_timeout_seconds = 5

        [cache]
        enabled = false
        redis_url = "redis://localhost:6379"
        task_ttl_seconds = 60
        connection_timeout_seconds = 5
        command_timeout_seconds = 3
        track_completeness = true

        [observability]
        log_level = "debug"
        log_format = "json"
        "#,
    )
    .unwrap()
}

#[tokio::test]
async fn test_embedded_application_serves_tasks() -> Result<()> {
    let app = Application::build(&embedded_config()).await?;
    let service = app.service();

    let id = service.create_task(7, NewTask::new("buy milk")).await?.into_value();
    let fetched = service.get_task_by_id(7, id).await?;
    assert!(!fetched.is_degraded());
    assert_eq!(fetched.into_value(), Task::new(id, "buy milk", 7));

    // Completeness tracking: a hash written by create is not yet a full list.
    let listed = service.get_all_tasks(7).await?.into_value();
    assert_eq!(listed, vec![Task::new(id, "buy milk", 7)]);
    let stats = app.tasks().stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);

    service.get_all_tasks(7).await?;
    assert_eq!(app.tasks().stats().await.hits, 2);

    app.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_health_report() -> Result<()> {
    let app = Application::build(&embedded_config()).await?;
    let report = app.health().await;

    assert!(report.is_healthy());
    assert_eq!(report.cache_backend, "memory");
    let json = serde_json::to_value(&report)?;
    assert_eq!(json["database"], true);
    Ok(())
}

#[tokio::test]
async fn test_settings_follow_configuration() -> Result<()> {
    let app = Application::build(&embedded_config()).await?;
    let settings = app.tasks().settings();
    assert!(settings.track_completeness);
    assert!(!settings.coalesce_misses);
    assert_eq!(settings.ttl.as_secs(), 60);
    Ok(())
}

#[tokio::test]
async fn test_file_config_and_persistent_database() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("tasks.db");
    let config_path = dir.path().join("taskcache.toml");
    std::fs::write(
        &config_path,
        format!(
            "[database]\nurl = \"sqlite://{}?mode=rwc\"\n\n[cache]\nenabled = false\ntask_ttl_seconds = 30\n",
            db_path.display()
        ),
    )?;

    let config = AppConfig::load(config_path.to_str())?;
    assert_eq!(config.cache.task_ttl_seconds, 30);

    let first = Application::build(&config).await?;
    let id = first
        .service()
        .create_task(3, NewTask::new("survives restart"))
        .await?
        .into_value();
    first.shutdown().await;

    // A fresh process starts with a cold cache over the same rows.
    let second = Application::build(&config).await?;
    let listed = second.service().get_all_tasks(3).await?.into_value();
    assert_eq!(listed, vec![Task::new(id, "survives restart", 3)]);
    assert_eq!(second.tasks().stats().await.misses, 1);
    second.shutdown().await;
    Ok(())
}
