pub mod alert_evaluation_sync;
