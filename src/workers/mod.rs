pub mod payment_jobs;
