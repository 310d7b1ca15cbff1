use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};

use screening_session::config::Config;
use screening_session::infrastructure::{Actor, MemoryStore, SyncHub};
use screening_session::models::{
    load_all_subtests, CompletionReason, ModuleType, ScoredResponse, Subtest, TimingConfig,
    ValidityStatus,
};
use screening_session::orchestrator::{AssessorSurface, SebOutcome, StudentDisplay};
use screening_session::services::display_renderer::render;
use screening_session::services::FluencyDimension;
use screening_session::utils::logging;

const SESSION_ID: &str = "demo-session";

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init(&config);
    logging::init_log_file(&config.session_log_file)
        .with_context(|| format!("无法创建日志文件: {}", config.session_log_file))?;

    let subtests = load_subtests(&config).await;
    logging::log_startup(&config, subtests.len());

    let store = Arc::new(MemoryStore::new());
    for subtest in &subtests {
        store.seed_subtest(subtest.clone());
    }
    let hub = Arc::new(SyncHub::new(config.channel_capacity));

    let assessor = AssessorSurface::open(
        store.clone(),
        hub.clone(),
        Actor::assessor("demo-assessor"),
        SESSION_ID,
        "demo-student",
        &config,
    )
    .await
    .context("创建评估会话失败")?;
    let assessor = Arc::new(Mutex::new(assessor));

    // 学生端：挂载后跟随通道
    let mut display = StudentDisplay::new(store.clone(), SESSION_ID, &config);
    display.mount().await.context("学生端挂载失败")?;
    let mut frames = display.frames();
    let student = tokio::spawn({
        let hub = hub.clone();
        async move { display.run(hub).await }
    });
    while hub.subscriber_count(SESSION_ID) == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let watcher = tokio::spawn(async move {
        while frames.changed().await.is_ok() {
            let view = render(&frames.borrow_and_update());
            let text = serde_json::to_string(&view).unwrap_or_default();
            info!("[学生端] 🖥️ {}", logging::truncate_text(&text, 80));
        }
    });

    for subtest in &subtests {
        run_subtest(&assessor, subtest).await?;
    }

    let summaries = {
        let mut guard = assessor.lock().await;
        guard.end_session(ValidityStatus::Valid).await?;
        guard.completion_summary().to_vec()
    };

    // 学生端收到结束帧后退出
    tokio::time::timeout(Duration::from_secs(5), student)
        .await
        .context("学生端未能在超时内退出")??;
    watcher.abort();

    logging::print_session_summary(SESSION_ID, &summaries, &config.session_log_file);
    Ok(())
}

/// 从配置目录加载分测验，目录不存在或为空时使用内置示例
async fn load_subtests(config: &Config) -> Vec<Subtest> {
    match load_all_subtests(&config.subtest_folder).await {
        Ok(subtests) if !subtests.is_empty() => subtests,
        Ok(_) => {
            warn!("⚠️ 目录 {} 中没有分测验，使用内置示例", config.subtest_folder);
            builtin_subtests()
        }
        Err(e) => {
            warn!("⚠️ 加载分测验失败，使用内置示例: {:#}", e);
            builtin_subtests()
        }
    }
}

/// 按模块类型演示一次完整的分测验流程
async fn run_subtest(assessor: &Arc<Mutex<AssessorSurface>>, subtest: &Subtest) -> Result<()> {
    let mut guard = assessor.lock().await;
    guard.navigate_to_subtest(&subtest.id).await?;

    match subtest.module_type {
        ModuleType::ItemList => {
            let total = subtest.total_items()?;
            for index in 0..total {
                guard.move_pointer(0.5, (index as f64 + 0.5) / total as f64)?;
                let scored = if index % 3 == 2 {
                    ScoredResponse::incorrect()
                } else {
                    ScoredResponse::correct()
                };
                guard
                    .record_response(&subtest.id, index, scored, Some(1_200), None)
                    .await?;
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            guard.clear_pointer();
            guard.complete_current_subtest(CompletionReason::Submitted).await?;
        }
        ModuleType::OralReading => {
            if let Some(scorer) = guard.orf_mut() {
                scorer.cycle_word(2)?;
                scorer.cycle_word(5)?;
                scorer.cycle_word(5)?;
                let stop = scorer.total_words().saturating_sub(1).min(20);
                scorer.toggle_stopping_point(stop)?;
                for dimension in FluencyDimension::ALL {
                    scorer.rate_fluency(dimension, 3)?;
                }
            }
            guard.start_timer()?;
            let timer = AssessorSurface::spawn_timer(assessor);
            drop(guard);

            tokio::time::sleep(Duration::from_millis(3_100)).await;
            assessor.lock().await.pause_timer()?;
            timer.await?;

            let mut guard = assessor.lock().await;
            guard.save_orf().await?;
            guard.complete_current_subtest(CompletionReason::Submitted).await?;
            guard.add_another_subtest().await?;
            return Ok(());
        }
        ModuleType::SebScreener | ModuleType::SebBrief => {
            let ratings = demo_ratings(subtest.module_type);
            match guard.score_seb(&ratings)? {
                SebOutcome::Full(result) => info!(
                    "📋 SEB 完整版: 总体风险 {}，红旗题 {:?}",
                    result.overall_risk, result.red_flag_items
                ),
                SebOutcome::Brief(result) => info!(
                    "📋 SEB 简版: 总体风险 {}，需跟进 {:?}",
                    result.overall_risk, result.requires_follow_up
                ),
            }
            guard.complete_current_subtest(CompletionReason::Submitted).await?;
        }
    }

    guard.add_another_subtest().await?;
    Ok(())
}

fn demo_ratings(module_type: ModuleType) -> HashMap<String, u8> {
    let pairs: &[(&str, u8)] = match module_type {
        ModuleType::SebBrief => &[("emotional_distress", 1), ("safety_behavior", 2)],
        _ => &[("att_1", 2), ("att_2", 2), ("hyp_1", 1), ("peer_1", 1)],
    };
    pairs.iter().map(|(id, r)| (id.to_string(), *r)).collect()
}

fn builtin_subtests() -> Vec<Subtest> {
    vec![
        Subtest {
            id: "letter-naming".to_string(),
            name: "字母命名".to_string(),
            module_type: ModuleType::ItemList,
            stimulus: json!({ "items": ["m", "s", "a", "t", "p", "o"] }),
            timing: TimingConfig::default(),
            script_prompt: Some("Point to each letter and say its name.".to_string()),
        },
        Subtest {
            id: "orf-grade-3".to_string(),
            name: "三年级朗读".to_string(),
            module_type: ModuleType::OralReading,
            stimulus: json!({
                "grade": 3,
                "passage": "Sam had a small red boat. Every morning he took the boat to the pond \
                            behind his house. The ducks swam next to him and the frogs jumped \
                            from the rocks into the cool green water."
            }),
            timing: TimingConfig {
                time_limit_seconds: Some(60),
                show_timer: true,
            },
            script_prompt: Some("Please read this story out loud.".to_string()),
        },
        Subtest {
            id: "seb-brief".to_string(),
            name: "SEB 简版".to_string(),
            module_type: ModuleType::SebBrief,
            stimulus: json!({}),
            timing: TimingConfig::default(),
            script_prompt: None,
        },
    ]
}
