mod common;

mod postgres_tests;
mod rabbitmq_tests;
