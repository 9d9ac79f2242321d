use crate::infra::{
    builtin_catalog, builtin_template_id, default_policy, InMemoryScheduleStore,
    InMemorySessionRepository,
};
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use fieldaudit::audits::catalog::TemplateCatalog;
use fieldaudit::audits::domain::{
    ItemId, OptionId, ResponseValue, ScheduleId, ScheduledAuditBinding, SessionId,
};
use fieldaudit::audits::repository::ScheduleStore;
use fieldaudit::audits::service::{AuditService, SessionError, StartOutcome, StartRequest};
use fieldaudit::audits::{BatchRequest, ResponseWrite};
use fieldaudit::error::AppError;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Override the demo's "today" (YYYY-MM-DD). Defaults to the local date.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Checklist template CSV to audit against. Defaults to the bundled
    /// store-walk template.
    #[arg(long)]
    pub(crate) template_csv: Option<PathBuf>,
    /// Print every checklist row with its stored answer after each batch.
    #[arg(long)]
    pub(crate) show_items: bool,
}

#[derive(Args, Debug)]
pub(crate) struct TemplateCheckArgs {
    /// Checklist template CSV to validate
    #[arg(long)]
    pub(crate) file: PathBuf,
    /// Template id to register the file under (defaults to the file stem)
    #[arg(long)]
    pub(crate) template_id: Option<String>,
}

pub(crate) fn run_template_check(args: TemplateCheckArgs) -> Result<(), AppError> {
    let TemplateCheckArgs { file, template_id } = args;

    let template_id = template_id.unwrap_or_else(|| {
        file.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "template".to_string())
    });

    let catalog = TemplateCatalog::from_path(&template_id, &file)?;
    let snapshot = catalog
        .get(&template_id)
        .expect("loaded template is registered");

    println!("Template '{}' ({})", template_id, file.display());
    println!(
        "- {} items across {} categories",
        snapshot.items.len(),
        snapshot.categories().len()
    );
    for category in snapshot.categories() {
        let items: Vec<_> = snapshot
            .items
            .iter()
            .filter(|item| item.category == category)
            .collect();
        let required = items.iter().filter(|item| item.required).count();
        println!("  {category}: {} items ({required} required)", items.len());
        for item in items {
            let mut notes: Vec<String> = Vec::new();
            if item.is_critical {
                notes.push("critical".to_string());
            }
            if let Some(spec) = item.derived_spec.as_ref() {
                let dependencies: Vec<_> = spec
                    .depends_on
                    .iter()
                    .map(|dependency| dependency.0.as_str())
                    .collect();
                notes.push(format!(
                    "{} of {}",
                    spec.aggregate.label(),
                    dependencies.join(", ")
                ));
            }
            if let Some(max) = item.max_score() {
                notes.push(format!("max score {max}"));
            }
            let suffix = if notes.is_empty() {
                String::new()
            } else {
                format!(" [{}]", notes.join("; "))
            };
            println!(
                "    - {} ({}){}{}",
                item.title,
                item.input_type.label(),
                if item.required { " *" } else { "" },
                suffix
            );
        }
    }

    Ok(())
}

type DemoService = AuditService<InMemorySessionRepository, InMemoryScheduleStore, TemplateCatalog>;

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        today,
        template_csv,
        show_items,
    } = args;

    let today = today.unwrap_or_else(|| Local::now().date_naive());

    let (catalog, template_id) = match template_csv {
        Some(path) => {
            let template_id = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "template".to_string());
            (TemplateCatalog::from_path(&template_id, &path)?, template_id)
        }
        None => (builtin_catalog()?, builtin_template_id().to_string()),
    };

    let repository = Arc::new(InMemorySessionRepository::default());
    let schedules = Arc::new(InMemoryScheduleStore::default());
    let service = AuditService::new(repository, schedules.clone(), Arc::new(catalog));

    println!("Audit lifecycle demo (template '{template_id}', today {today})");

    let scheduled_id = seed_schedule(&schedules, today)?;
    let session_id = demo_scheduling(&service, &template_id, &scheduled_id, today)?;
    demo_batches(&service, &template_id, &session_id, show_items)?;
    demo_completion_and_report(&service, &session_id)?;

    Ok(())
}

/// The planner booked this walk for tomorrow, so the demo has a date gate to
/// trip and a reschedule to demonstrate.
fn seed_schedule(
    schedules: &InMemoryScheduleStore,
    today: NaiveDate,
) -> Result<ScheduleId, AppError> {
    let scheduled_id = ScheduleId("walk-2026-w1".to_string());
    let binding = ScheduledAuditBinding::new(scheduled_id.clone(), today + Duration::days(1));
    schedules
        .insert(binding)
        .map_err(SessionError::Repository)?;
    Ok(scheduled_id)
}

fn demo_scheduling(
    service: &DemoService,
    template_id: &str,
    scheduled_id: &ScheduleId,
    today: NaiveDate,
) -> Result<SessionId, AppError> {
    println!("\nScheduled start gate");

    let request = StartRequest {
        template_id: template_id.to_string(),
        location_id: "store-042".to_string(),
        principal: "auditor-7".to_string(),
        dedup_token: Some("demo-retry-token".to_string()),
        scheduled_id: Some(scheduled_id.clone()),
    };

    match service.start(request.clone(), today) {
        Err(SessionError::NotScheduledToday {
            scheduled_for,
            today,
        }) => println!("- Start refused: scheduled for {scheduled_for}, today is {today}"),
        Ok(_) => println!("- Unexpected: gate let the early start through"),
        Err(err) => println!("- Unexpected start error: {err}"),
    }

    let binding = service.reschedule(scheduled_id, today)?;
    println!(
        "- Rescheduled to {} ({} of {} moves used, originally {})",
        binding.current_scheduled_date,
        binding.reschedule_count,
        fieldaudit::audits::domain::MAX_RESCHEDULES,
        binding.original_scheduled_date
    );

    let first = service.start(request.clone(), today)?;
    let session_id = first.record().session.session_id.clone();
    println!("- Started session {session_id}");

    // Same request again, as a lossy mobile client would resend it.
    match service.start(request, today)? {
        StartOutcome::Existing(record) => println!(
            "- Retried start absorbed: returned existing session {}",
            record.session.session_id
        ),
        StartOutcome::Created(record) => println!(
            "- Unexpected: retry created a second session {}",
            record.session.session_id
        ),
    }

    Ok(session_id)
}

fn demo_batches(
    service: &DemoService,
    template_id: &str,
    session_id: &SessionId,
    show_items: bool,
) -> Result<(), AppError> {
    println!("\nResponse batches");

    if template_id != builtin_template_id() {
        println!("- Custom template supplied; skipping the scripted answer batches");
        return Ok(());
    }

    // A scoped batch that leaves a required item unanswered is refused whole.
    let invalid = BatchRequest {
        responses: vec![select("fs-sanitizer", 1, None)],
        category: Some("Food Safety".to_string()),
    };
    match service.apply(session_id, &invalid) {
        Err(SessionError::Validation(rejection)) => {
            println!("- Scoped batch rejected, nothing stored: {rejection}")
        }
        Ok(_) => println!("- Unexpected: incomplete scoped batch was accepted"),
        Err(err) => println!("- Unexpected batch error: {err}"),
    }

    let first = BatchRequest {
        responses: vec![
            select("fs-sanitizer", 1, None),
            select("fs-storage", 2, Some("Chicken stored above produce")),
            text("fs-note", "Walk completed during morning prep"),
            photo(
                "eq-gauge-photo",
                "https://cdn.example.com/audits/store-042/gauge.jpg",
            ),
            number("eq-attempt-1", 41.0),
            number("eq-attempt-2", 43.0),
        ],
        category: None,
    };
    let applied = service.apply(session_id, &first)?;
    println!("- First batch applied {} rows", applied.len());
    if let Some(average) = applied
        .iter()
        .find(|response| response.item_id.0 == "eq-average")
        .and_then(|response| response.numeric_value())
    {
        println!("  Derived average compressor reading: {average}");
    }

    let retried = service.apply(session_id, &first)?;
    println!(
        "- Identical batch re-applied ({} rows); stored state unchanged",
        retried.len()
    );

    if show_items {
        let progress = service.progress(session_id)?;
        println!("  Checklist state:");
        for item in &progress.items {
            println!(
                "    - [{}] {} ({})",
                item.status, item.title, item.category
            );
        }
    }

    Ok(())
}

fn demo_completion_and_report(
    service: &DemoService,
    session_id: &SessionId,
) -> Result<(), AppError> {
    println!("\nCompletion gate");

    match service.complete(session_id) {
        Err(SessionError::Incomplete { categories }) => println!(
            "- Complete refused, incomplete categories: {}",
            categories.join(", ")
        ),
        Ok(_) => println!("- Unexpected: session completed with pending sign-off"),
        Err(err) => println!("- Unexpected completion error: {err}"),
    }

    let sign_off = BatchRequest {
        responses: vec![signature("so-manager-sign", "M 10 10 L 120 40 L 180 20")],
        category: None,
    };
    service.apply(session_id, &sign_off)?;

    let session = service.complete(session_id)?;
    println!("- Session {} completed", session.session_id);

    // The retried completion is a no-op success rather than an error.
    service.complete(session_id)?;
    println!("- Retried completion absorbed as a no-op");

    let progress = service.progress(session_id)?;
    println!("\nCategory progress");
    for category in &progress.categories {
        println!(
            "- {}: {}/{} complete",
            category.category, category.completed_count, category.total_count
        );
    }

    let report = service.report(session_id, &default_policy())?;
    println!("\nScore report");
    println!(
        "- Overall {}% ({} of {} points)",
        report.summary.percentage, report.summary.actual_score, report.summary.max_score
    );
    for category in &report.score_by_category {
        println!(
            "- {}: {}% ({} of {})",
            category.category, category.percentage, category.actual_score, category.max_score
        );
    }

    println!("\nCorrective-action plan");
    if report.action_plan.is_empty() {
        println!("- No deviations found");
    }
    for entry in &report.action_plan {
        println!(
            "- [{}] {} ({}) -> {} | owner {} | due {}",
            entry.severity.label(),
            entry.question,
            entry.category,
            entry.corrective_action,
            entry.owner,
            entry.due_date
        );
    }

    Ok(())
}

fn select(item_id: &str, option_index: usize, remark: Option<&str>) -> ResponseWrite {
    ResponseWrite {
        item_id: ItemId(item_id.to_string()),
        value: ResponseValue::Selection {
            option_id: OptionId(format!("{item_id}-opt-{option_index}")),
            remark: remark.map(str::to_string),
        },
    }
}

fn number(item_id: &str, value: f64) -> ResponseWrite {
    ResponseWrite {
        item_id: ItemId(item_id.to_string()),
        value: ResponseValue::Number {
            value,
            remark: None,
        },
    }
}

fn text(item_id: &str, comment: &str) -> ResponseWrite {
    ResponseWrite {
        item_id: ItemId(item_id.to_string()),
        value: ResponseValue::Text {
            comment: comment.to_string(),
        },
    }
}

fn photo(item_id: &str, url: &str) -> ResponseWrite {
    ResponseWrite {
        item_id: ItemId(item_id.to_string()),
        value: ResponseValue::Photo {
            photo_url: url.to_string(),
        },
    }
}

fn signature(item_id: &str, strokes: &str) -> ResponseWrite {
    ResponseWrite {
        item_id: ItemId(item_id.to_string()),
        value: ResponseValue::Signature {
            strokes: strokes.to_string(),
        },
    }
}
