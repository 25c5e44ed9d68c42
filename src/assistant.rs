//! The legal assistant: prompt assembly, answer cleanup and the canned
//! replies used whenever the model cannot answer.

use anyhow::Result;
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::config::LlmConfig;
use crate::llm::{ChatModel, ChatTurn, CompletionRequest};
use crate::matcher::find_relevant_documents;
use crate::models::ChatMessage;
use crate::text::{collapse_blank_lines, strip_think_tags};

/// Answers shorter than this (in bytes) are replaced by [`APOLOGY`].
const MIN_ANSWER_BYTES: usize = 20;

pub const APOLOGY: &str = "Je suis désolé, je n'ai pas pu générer une réponse appropriée à votre question sur la législation ivoirienne. Pouvez-vous reformuler votre question ?";

pub const NO_CONTENT: &str = "Désolé, je n'ai pas pu générer une réponse appropriée.";

pub const SYSTEM_PROMPT: &str = "Vous êtes un assistant juridique IA spécialisé dans la législation ivoirienne. Vous devez répondre à toutes les questions en les ramenant au contexte du droit ivoirien. Référez-vous systématiquement aux textes juridiques ivoiriens : Constitution, codes (pénal, civil, du travail, etc.), lois, décrets, arrêtés, circulaires et autres documents officiels.

DIRECTIVES :
- Répondez toujours de manière utile et informative
- Utilisez exclusivement des références à la législation ivoirienne
- Adaptez votre langage au niveau de votre interlocuteur : vocabulaire simple et accessible pour les questions générales, plus technique et juridique pour les professionnels
- Si le sujet est ambigu, interprétez-le dans le contexte ivoirien
- Ne refusez jamais une question, mais redirigez poliment vers des sujets juridiques ivoiriens
- Fournissez des réponses précises avec citations des textes applicables

DOCUMENTS JURIDIQUES À RÉFÉRENCER :
- Constitution de 2016
- Codes : pénal, civil, du travail, commercial, des assurances, etc.
- Lois organiques et ordinaires
- Décrets présidentiels et gouvernementaux
- Arrêtés ministériels
- Décisions et jurisprudences de la Cour suprême
- Textes de l'OHADA pour le droit des affaires

SUJETS COUVERTS :
- Droits fondamentaux et libertés publiques
- Nationalité et citoyenneté
- Droit des personnes et de la famille
- Droit des biens et successions
- Droit du travail et sécurité sociale
- Droit pénal et procédure pénale
- Droit des sociétés et commerce
- Droit administratif et contentieux";

const CANNED_CONSTITUTION: &str = "La Constitution ivoirienne de 2016 consacre les droits fondamentaux de la personne humaine dans son Titre II. Elle garantit notamment :\n\n- L'égalité de tous les citoyens devant la loi (Article 2)\n- La liberté de conscience et de religion\n- Le droit à la vie et à la sécurité\n- Le droit à l'éducation et à la santé\n\nCes droits sont inaliénables et imprescriptibles. L'État a l'obligation de les respecter et de les protéger.";

const CANNED_TRAVAIL: &str = "Le Code du travail ivoirien (Loi n° 2015-532) régit les relations entre employeurs et travailleurs. Voici les points clés :\n\n**Contrat de travail :**\n- Définition : convention par laquelle une personne met son activité sous la direction d'une autre contre rémunération\n- Peut être à durée déterminée ou indéterminée\n\n**Durée du travail :**\n- 40 heures par semaine maximum\n- Repos hebdomadaire obligatoire\n\n**Congés payés :**\n- 2,5 jours ouvrables par mois de service effectif";

const CANNED_PENAL: &str = "Le Code pénal ivoirien (Loi n° 81-640) définit les infractions et fixe les peines. Il distingue trois catégories d'infractions :\n\n**1. Contraventions :**\n- Infractions les moins graves\n- Punies d'amendes\n\n**2. Délits :**\n- Infractions de gravité moyenne\n- Punis d'emprisonnement jusqu'à 5 ans et/ou d'amendes\n\n**3. Crimes :**\n- Infractions les plus graves\n- Punis de réclusion criminelle\n\nLe principe de la légalité des délits et des peines s'applique : nulle infraction sans loi, nulle peine sans loi.";

const CANNED_ENTREPRISE: &str = "Pour créer une entreprise en Côte d'Ivoire, plusieurs formes juridiques sont possibles :\n\n**1. Entreprise individuelle :**\n- Plus simple à créer\n- Responsabilité illimitée du dirigeant\n\n**2. SARL (Société à Responsabilité Limitée) :**\n- Capital minimum : 1 000 000 FCFA\n- 1 à 50 associés\n\n**3. SA (Société Anonyme) :**\n- Capital minimum : 10 000 000 FCFA\n- Minimum 7 actionnaires\n\n**Démarches :** Inscription au CEPICI, immatriculation au RCCM, déclaration fiscale.";

const CANNED_DEFAULT: &str = "Je suis spécialisé dans la législation ivoirienne et je peux vous aider avec des questions sur :\n\n- La Constitution de 2016\n- Le Code du travail\n- Le Code pénal\n- Le droit commercial et des sociétés\n- Les procédures administratives\n\nPouvez-vous préciser votre question ou le domaine juridique qui vous intéresse ?";

/// Static answer picked by keyword when the model is unavailable.
pub fn canned_reply(message: &str) -> &'static str {
    let m = message.to_lowercase();
    let any = |words: &[&str]| words.iter().any(|w| m.contains(w));

    if any(&["constitution", "droits de l'homme"]) {
        CANNED_CONSTITUTION
    } else if any(&["travail", "employé", "salarié"]) {
        CANNED_TRAVAIL
    } else if any(&["pénal", "crime", "délit"]) {
        CANNED_PENAL
    } else if any(&["entreprise", "société", "commerce"]) {
        CANNED_ENTREPRISE
    } else {
        CANNED_DEFAULT
    }
}

/// System prompt, the most recent `context_messages` prior messages (oldest
/// first), then the new user message.
pub fn build_conversation(
    history: &[ChatMessage],
    new_message: &str,
    context_messages: usize,
) -> Vec<ChatTurn> {
    let start = history.len().saturating_sub(context_messages);
    let mut turns = Vec::with_capacity(history.len() - start + 2);
    turns.push(ChatTurn::system(SYSTEM_PROMPT));
    for message in &history[start..] {
        if message.is_user() {
            turns.push(ChatTurn::user(message.content.clone()));
        } else {
            turns.push(ChatTurn::assistant(message.content.clone()));
        }
    }
    turns.push(ChatTurn::user(new_message));
    turns
}

/// Removes reasoning blocks and extra blank lines. Near-empty answers become
/// [`APOLOGY`].
pub fn clean_answer(raw: &str) -> String {
    let cleaned = collapse_blank_lines(&strip_think_tags(raw));
    let cleaned = cleaned.trim();
    if cleaned.len() < MIN_ANSWER_BYTES {
        return APOLOGY.to_string();
    }
    cleaned.to_string()
}

/// Assistant answer with the metadata stored next to it.
#[derive(Debug, Clone)]
pub struct Reply {
    pub content: String,
    pub metadata: Value,
}

/// Asks the model; any failure is logged and replaced by a canned reply.
/// Cited documents are attached either way.
pub async fn generate_reply(
    model: &dyn ChatModel,
    pool: &SqlitePool,
    config: &LlmConfig,
    history: &[ChatMessage],
    message: &str,
) -> Result<Reply> {
    let request = CompletionRequest {
        messages: build_conversation(history, message, config.context_messages.max(0) as usize),
        temperature: config.chat_temperature,
        max_tokens: config.max_tokens,
    };

    let outcome = model.complete(&request).await;
    let cited = find_relevant_documents(pool, message).await?;

    match outcome {
        Ok(answer) => {
            let content = match answer {
                Some(raw) => clean_answer(&raw),
                None => NO_CONTENT.to_string(),
            };
            Ok(Reply {
                content,
                metadata: json!({
                    "cited_documents": cited,
                    "model": model.model_name(),
                }),
            })
        }
        Err(err) => {
            tracing::error!(error = %err, model = model.model_name(), "chat completion failed, using canned reply");
            Ok(Reply {
                content: canned_reply(message).to_string(),
                metadata: json!({ "cited_documents": cited }),
            })
        }
    }
}
