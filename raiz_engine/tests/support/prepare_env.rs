use raiz_engine::{
    db_types::{NewUser, User},
    test_utils::{self, TestDatabase},
    traits::{OrderLifecycleDatabase, UserManagement},
    SqliteDatabase,
};

pub async fn prepare_test_env() -> SqliteDatabase {
    test_utils::prepare_test_env().await.db
}

pub async fn tear_down(db: SqliteDatabase) {
    let url = db.url().to_string();
    TestDatabase { url, db }.drop_database().await;
}

pub async fn create_user(db: &SqliteDatabase, email: &str) -> User {
    // The hash is never checked in these tests
    let user = NewUser { email: email.to_string(), password_hash: "x".into(), full_name: Some("Maria Souza".into()) };
    db.create_user(user).await.expect("Error creating user")
}
