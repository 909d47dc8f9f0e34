mod cancellation_test;
mod delete_test;
mod duplicate_key_test;
mod find_test;
mod inheritance_test;
mod insert_test;
mod replace_test;
mod update_test;
