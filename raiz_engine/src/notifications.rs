//! # User notifications
//!
//! The messages the service sends to its users. Messages are only composed here. They are delivered by the mail
//! worker after being placed on the `email` job queue, usually in the same transaction as the state change that
//! triggered them.
use crate::db_types::{EmailMessage, OrderStatusType, SearchOrder, User};

pub const SUBJECT_WELCOME: &str = "Bem-vindo ao RaizDigital";
pub const SUBJECT_PASSWORD_RESET: &str = "Redefinição de senha";
pub const SUBJECT_SEARCH_STARTED: &str = "Sua busca foi iniciada";
pub const SUBJECT_SEARCH_RESULT: &str = "Resultado da sua busca de certidão";

const SIGNATURE: &str = "Atenciosamente,\nEquipe RaizDigital";

pub fn welcome_email(user: &User) -> EmailMessage {
    let body = format!(
        "Olá {},\n\nObrigado por se registrar no RaizDigital. Agora você pode iniciar suas buscas de certidões \
         diretamente pelo seu painel.\n\n{SIGNATURE}",
        user.display_name()
    );
    EmailMessage::new(&user.email, SUBJECT_WELCOME, body)
}

/// The reset link points at the frontend page that collects the new password.
pub fn password_reset_email(user: &User, frontend_base_url: &str, token: &str) -> EmailMessage {
    let link = password_reset_link(frontend_base_url, token);
    let body = format!(
        "Olá {},\n\nRecebemos uma solicitação para redefinir sua senha. Para criar uma nova senha, clique no link \
         abaixo:\n{link}\n\nSe você não solicitou esta redefinição, ignore este e-mail.\n\n{SIGNATURE}",
        user.display_name()
    );
    EmailMessage::new(&user.email, SUBJECT_PASSWORD_RESET, body)
}

pub fn password_reset_link(frontend_base_url: &str, token: &str) -> String {
    format!("{}/redefinir-senha/{token}", frontend_base_url.trim_end_matches('/'))
}

pub fn search_started_email(user: &User, order: &SearchOrder) -> EmailMessage {
    let body = format!(
        "Olá {},\n\nRecebemos o seu pagamento para a busca da certidão de {}. Nossa equipe e robôs estão iniciando a \
         busca e enviaremos um e-mail quando estiver concluída.\n\n{SIGNATURE}",
        user.display_name(),
        order.target_name
    );
    EmailMessage::new(&user.email, SUBJECT_SEARCH_STARTED, body)
}

/// The wording depends on whether the order completed successfully.
pub fn search_result_email(user: &User, order: &SearchOrder) -> EmailMessage {
    let body = match order.status {
        OrderStatusType::CompletedSuccess => format!(
            "Olá {},\n\nEncontramos a certidão procurada para {}. Faça login para ver os detalhes.\n\n{SIGNATURE}",
            user.display_name(),
            order.target_name
        ),
        _ => format!(
            "Olá {},\n\nInfelizmente não encontramos a certidão procurada para {}.\nConfira o relatório de busca no \
             seu painel.\n\n{SIGNATURE}",
            user.display_name(),
            order.target_name
        ),
    };
    EmailMessage::new(&user.email, SUBJECT_SEARCH_RESULT, body)
}
