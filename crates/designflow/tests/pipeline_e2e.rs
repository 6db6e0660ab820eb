//! End-to-end runs through submission, upload and all six stages.

mod common;

use std::sync::Arc;

use common::{design_request, BrokenStorage, TestHarness, PNG_BYTES};
use designflow::store::JobQueryParams;
use designflow::{
    DesignJob, DesignflowError, ImageUpload, JobReader, JobStatus, StageName, StageResult,
    StepStatus, ValidationError,
};

/// Step status changes between consecutive records, in commit order.
fn step_transitions(records: &[DesignJob]) -> Vec<(StageName, StepStatus)> {
    records
        .windows(2)
        .flat_map(|pair| {
            pair[1]
                .steps
                .iter()
                .zip(&pair[0].steps)
                .filter(|(after, before)| after.status != before.status)
                .map(|(after, _)| (after.name, after.status))
                .collect::<Vec<_>>()
        })
        .collect()
}

#[tokio::test]
async fn test_feed_reports_every_transition_in_order() {
    let harness = TestHarness::new();
    let service = harness.service();

    let (id, handle) = service.submit(design_request("make it denim")).unwrap();
    let submitted = harness.store.get_job(&id).unwrap();
    let mut feed = harness.store.subscribe(&id).unwrap();
    assert_eq!(submitted.status, JobStatus::Pending);
    assert!(submitted.steps.iter().all(|s| s.status == StepStatus::Pending));

    handle.await.unwrap().unwrap();

    let mut records = vec![submitted];
    while let Ok(Some(job)) = feed.try_recv() {
        records.push(job);
    }

    let statuses: Vec<JobStatus> = records.iter().map(|j| j.status).collect();
    assert_eq!(statuses[1], JobStatus::Processing);
    assert!(records[1].steps.iter().all(|s| s.status == StepStatus::Pending));
    let last = statuses.len() - 1;
    assert!(statuses[1..last].iter().all(|s| *s == JobStatus::Processing));
    assert_eq!(statuses[last], JobStatus::Completed);

    let expected: Vec<(StageName, StepStatus)> = StageName::ALL
        .into_iter()
        .flat_map(|stage| [(stage, StepStatus::Processing), (stage, StepStatus::Completed)])
        .collect();
    assert_eq!(step_transitions(&records), expected);

    for pair in records.windows(2) {
        assert_eq!(pair[1].revision, pair[0].revision + 1);
    }
    let finished = &records[last];
    assert!(finished.completed_at.is_some());
    assert!(records[..last].iter().all(|j| j.completed_at.is_none()));
}

#[tokio::test]
async fn test_design_completes_every_stage() {
    let harness = TestHarness::new();
    let service = harness.service();

    let (id, handle) = service.submit(design_request("make it denim")).unwrap();
    let status = handle.await.unwrap().unwrap();
    assert_eq!(status, JobStatus::Completed);

    let job = harness.store.get_job(&id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.design_prompt, "make it denim");
    assert!(job.completed_at.is_some());
    assert!(job.error_message.is_none());
    assert_eq!(job.overall_progress(), 100);
    assert_eq!(job.current_step_index, 5);

    for (step, stage) in job.steps.iter().zip(StageName::ALL) {
        assert_eq!(step.name, stage);
        assert_eq!(step.status, StepStatus::Completed, "{} not completed", stage);
        assert_eq!(step.progress, 100);
        assert!(step.started_at.is_some());
        assert!(step.completed_at >= step.started_at);
        assert_eq!(step.result_data.as_ref().map(|r| r.stage()), Some(stage));
    }

    let garment_key = format!("{}/garment.png", id);
    assert_eq!(job.garment_image.as_deref(), Some(garment_key.as_str()));
    assert_eq!(
        std::fs::read(harness.asset_path(&garment_key)).unwrap(),
        PNG_BYTES
    );
    assert!(matches!(
        job.step(StageName::ConceptGeneration).unwrap().result_data,
        Some(StageResult::ConceptGeneration { ref concepts }) if concepts.len() == 3
    ));
}

#[tokio::test]
async fn test_stage_failure_stops_pipeline() {
    let harness = TestHarness::new();
    let service =
        harness.service_with(harness.failing_stages(StageName::ConceptGeneration, "model timeout"));

    let (id, handle) = service.submit(design_request("make it denim")).unwrap();
    assert_eq!(handle.await.unwrap().unwrap(), JobStatus::Error);

    let job = harness.store.get_job(&id).unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.error_message.as_deref(), Some("model timeout"));
    assert!(job.completed_at.is_none());

    let statuses: Vec<StepStatus> = job.steps.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![
            StepStatus::Completed,
            StepStatus::Completed,
            StepStatus::Error,
            StepStatus::Pending,
            StepStatus::Pending,
            StepStatus::Pending,
        ]
    );
    let failed = job.failed_step().unwrap();
    assert_eq!(failed.name, StageName::ConceptGeneration);
    assert_eq!(failed.error_message.as_deref(), Some("model timeout"));
    assert!(failed.result_data.is_none());
}

#[tokio::test]
async fn test_empty_prompt_creates_no_job() {
    let harness = TestHarness::new();
    let service = harness.service();

    let err = service.create_design(design_request("  \n ")).unwrap_err();
    assert!(matches!(
        err,
        DesignflowError::Validation(ValidationError::EmptyPrompt)
    ));

    let listed = harness.store.list(&JobQueryParams::default()).unwrap();
    assert_eq!(listed.total, 0);
    assert!(std::fs::read_dir(&harness.asset_dir).unwrap().next().is_none());
}

#[tokio::test]
async fn test_missing_garment_creates_no_job() {
    let harness = TestHarness::new();
    let service = harness.service();

    let mut request = design_request("make it denim");
    request.garment_image = None;
    let err = service.create_design(request).unwrap_err();
    assert!(matches!(
        err,
        DesignflowError::Validation(ValidationError::MissingGarmentImage)
    ));
    assert_eq!(harness.store.counts().pending, 0);
}

#[tokio::test]
async fn test_upload_failure_marks_job_failed() {
    let harness = TestHarness::new();
    let service = harness.service_with_storage(harness.instant_stages(), Arc::new(BrokenStorage));

    let err = service.create_design(design_request("make it denim")).unwrap_err();
    assert!(matches!(err, DesignflowError::Upload(_)));
    assert_eq!(err.to_string(), "Failed to upload garment image");

    let listed = harness.store.list(&JobQueryParams::default()).unwrap();
    assert_eq!(listed.total, 1);
    let job = &listed.jobs[0];
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(
        job.error_message.as_deref(),
        Some("Failed to upload garment image")
    );

    let upload = job.step(StageName::Upload).unwrap();
    assert_eq!(upload.status, StepStatus::Error);
    assert_eq!(
        upload.error_message.as_deref(),
        Some("Failed to upload garment image")
    );
    assert!(service.runner().active_jobs().is_empty());
}

#[tokio::test]
async fn test_style_swatch_is_stored_and_carried_through() {
    let harness = TestHarness::new();
    let service = harness.service();

    let mut request = design_request("make it denim");
    request.style_swatch_image = Some(ImageUpload::new("Swatch.JPG", vec![0xFF, 0xD8, 0xFF]));

    let (id, handle) = service.submit(request).unwrap();
    assert_eq!(handle.await.unwrap().unwrap(), JobStatus::Completed);

    let swatch_key = format!("{}/style_swatch.jpg", id);
    let job = harness.store.get_job(&id).unwrap();
    assert_eq!(job.style_swatch_image.as_deref(), Some(swatch_key.as_str()));
    assert!(harness.asset_path(&swatch_key).exists());

    match job.step(StageName::Upload).unwrap().result_data {
        Some(StageResult::Upload {
            ref style_swatch_image,
            ..
        }) => assert_eq!(style_swatch_image.as_deref(), Some(swatch_key.as_str())),
        ref other => panic!("unexpected upload result {:?}", other),
    }
}

#[tokio::test]
async fn test_prompt_is_trimmed() {
    let harness = TestHarness::new();
    let service = harness.service();

    let (id, handle) = service.submit(design_request("  cropped, boxy  ")).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(
        harness.store.get_job(&id).unwrap().design_prompt,
        "cropped, boxy"
    );
}

#[tokio::test]
async fn test_concurrent_designs_are_independent() {
    let harness = TestHarness::new();
    let service =
        harness.service_with(harness.failing_stages(StageName::FitSimulation, "solver diverged"));

    let mut handles = Vec::new();
    for n in 0..4 {
        handles.push(
            service
                .submit(design_request(&format!("variant {}", n)))
                .unwrap(),
        );
    }
    for (id, handle) in handles {
        assert_eq!(handle.await.unwrap().unwrap(), JobStatus::Error);
        let job = harness.store.get_job(&id).unwrap();
        assert_eq!(job.error_message.as_deref(), Some("solver diverged"));
        assert_eq!(job.overall_progress(), 67);
    }
    assert_eq!(harness.store.counts().error, 4);
}
