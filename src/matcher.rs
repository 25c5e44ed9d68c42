//! Picks the documents the assistant cites next to its answer.
//!
//! Three passes, stopping as soon as one yields enough:
//!
//! 1. Topic lists: each legal domain whose keywords appear in the message
//!    contributes up to two public documents.
//! 2. Free words: with fewer than two hits, every significant word of the
//!    message is matched against title, content and summary (featured first).
//! 3. Featured: with still nothing, the featured documents.
//!
//! Results are de-duplicated and capped at [`MAX_CITED`].

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashSet;

use crate::categories::attach_categories;
use crate::models::{Document, DOCUMENT_COLUMNS, PUBLIC_STATUS};

pub const MAX_CITED: usize = 5;
const PER_TOPIC: i64 = 2;
const FREE_WORD_LIMIT: i64 = 3;
const FEATURED_LIMIT: i64 = 3;

const STOP_WORDS: [&str; 18] = [
    "dans", "pour", "avec", "sans", "être", "avoir", "faire", "dire", "aller", "voir", "savoir",
    "pouvoir", "falloir", "vouloir", "venir", "devoir", "prendre", "donner",
];

/// Which documents a topic points at.
#[derive(Debug, Clone, Copy)]
pub enum TopicTarget {
    DocumentType(&'static str),
    /// Title contains any of these fragments.
    TitleLike(&'static [&'static str]),
}

#[derive(Debug)]
pub struct Topic {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub target: TopicTarget,
}

pub static TOPICS: [Topic; 8] = [
    Topic {
        name: "constitution",
        keywords: &[
            "constitution", "droits de l'homme", "droits fondamentaux", "liberté", "libertés",
            "république", "souveraineté", "démocratie", "égalité", "justice", "dignité",
            "citoyen", "citoyens", "préambule", "fondamental",
        ],
        target: TopicTarget::DocumentType("constitution"),
    },
    Topic {
        name: "travail",
        keywords: &[
            "travail", "employé", "salarié", "contrat", "congé", "emploi", "embauche",
            "licenciement", "salaire", "rémunération", "patron", "employeur", "syndicat",
            "grève", "horaire", "pause", "repos", "maladie", "accident", "sécurité sociale",
            "cnps", "retraite", "apprentissage", "formation", "stage", "stagiaire", "démission",
        ],
        target: TopicTarget::TitleLike(&["travail"]),
    },
    Topic {
        name: "pénal",
        keywords: &[
            "pénal", "crime", "délit", "infraction", "prison", "amende", "tribunal", "juge",
            "procès", "avocat", "police", "gendarmerie", "arrestation", "garde à vue", "enquête",
            "vol", "meurtre", "agression", "violence", "viol", "corruption", "fraude",
            "escroquerie", "blanchiment", "stupéfiant", "drogue", "trafic", "contrebande",
            "peine", "condamnation",
        ],
        target: TopicTarget::TitleLike(&["pénal"]),
    },
    Topic {
        name: "commerce",
        keywords: &[
            "entreprise", "société", "commerce", "sarl", "sa", "business", "commercial",
            "commerçant", "boutique", "magasin", "vente", "achat", "client", "fournisseur",
            "facture", "crédit", "banque", "prêt", "investissement", "capital", "actionnaire",
            "associé", "partenaire", "cepici", "rccm", "immatriculation", "création", "startup",
            "entrepreneur", "auto-entrepreneur", "ohada", "concurrence", "monopole",
        ],
        target: TopicTarget::TitleLike(&["commerce", "société", "civil", "ohada"]),
    },
    Topic {
        name: "nationalité",
        keywords: &[
            "nationalité", "citoyenneté", "naturalis", "ivoirien", "ivoirienne", "passeport",
            "carte d'identité", "cni", "étranger", "étrangère", "immigration", "émigration",
            "visa", "résidence", "expatrié", "diaspora", "binational", "apatride", "naissance",
            "filiation", "adoption",
        ],
        target: TopicTarget::TitleLike(&["nationalité"]),
    },
    Topic {
        name: "famille",
        keywords: &[
            "mariage", "divorce", "famille", "enfant", "succession", "époux", "épouse",
            "conjoint", "mari", "femme", "père", "mère", "parent", "tutelle", "curatelle",
            "héritage", "testament", "héritier", "veuve", "veuf", "orphelin", "pension",
            "alimentaire", "garde", "custody", "mineur", "majeur", "émancipation", "dot",
            "polygamie",
        ],
        target: TopicTarget::TitleLike(&["civil", "famille", "mariage", "succession"]),
    },
    Topic {
        name: "fiscal",
        keywords: &[
            "fiscal", "impôt", "taxe", "douane", "tva", "irpp", "is", "contribution",
            "redevance", "déclaration", "contrôle", "redressement", "contentieux", "recours",
            "exonération", "déduction", "abattement", "crédit d'impôt", "patente", "foncier",
            "enregistrement",
        ],
        target: TopicTarget::TitleLike(&["fiscal", "impôt", "douane", "taxe"]),
    },
    Topic {
        name: "administratif",
        keywords: &[
            "administratif", "administration", "préfet", "maire", "ministre", "fonctionnaire",
            "service public", "permis", "autorisation", "agrément", "concession",
            "marché public", "adjudication", "appel d'offres", "urbanisme", "construction",
            "bâtiment", "environnement",
        ],
        target: TopicTarget::TitleLike(&["administratif", "administration", "urbanisme", "environnement"]),
    },
];

/// A document as embedded in an assistant message's metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CitedDocument {
    pub id: i64,
    pub title: String,
    pub slug: String,
    #[serde(rename = "type")]
    pub doc_type: String,
    pub reference_number: Option<String>,
    pub category: Option<String>,
}

impl From<&Document> for CitedDocument {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            title: doc.title.clone(),
            slug: doc.slug.clone(),
            doc_type: doc.doc_type.clone(),
            reference_number: doc.reference_number.clone(),
            category: doc.category.as_ref().map(|c| c.name.clone()),
        }
    }
}

/// Topics with a keyword contained anywhere in `message`, in declaration
/// order. Keywords match as substrings, short ones included.
pub fn matched_topics(message: &str) -> Vec<&'static Topic> {
    let lowered = message.to_lowercase();
    TOPICS
        .iter()
        .filter(|topic| topic.keywords.iter().any(|k| lowered.contains(k)))
        .collect()
}

/// Space-separated words longer than three characters that are not stop words.
pub fn significant_words(message: &str) -> Vec<String> {
    message
        .to_lowercase()
        .split(' ')
        .map(|w| w.trim_matches(|c: char| c.is_ascii_punctuation() || c == '«' || c == '»'))
        .filter(|w| w.chars().count() > 3 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

fn public_base() -> QueryBuilder<'static, Sqlite> {
    let mut qb = QueryBuilder::new(format!("SELECT {} FROM legal_documents d", DOCUMENT_COLUMNS));
    qb.push(" WHERE d.deleted_at IS NULL AND d.status = ")
        .push_bind(PUBLIC_STATUS);
    qb
}

async fn fetch(pool: &SqlitePool, mut qb: QueryBuilder<'_, Sqlite>) -> Result<Vec<Document>> {
    let rows = qb.build().fetch_all(pool).await?;
    Ok(rows.iter().map(Document::from_row).collect())
}

async fn topic_documents(pool: &SqlitePool, topic: &Topic) -> Result<Vec<Document>> {
    let mut qb = public_base();
    match topic.target {
        TopicTarget::DocumentType(doc_type) => {
            qb.push(" AND d.type = ").push_bind(doc_type);
        }
        TopicTarget::TitleLike(fragments) => {
            qb.push(" AND (");
            for (i, fragment) in fragments.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push("d.title LIKE ").push_bind(format!("%{}%", fragment));
            }
            qb.push(")");
        }
    }
    qb.push(" ORDER BY d.id LIMIT ").push_bind(PER_TOPIC);
    fetch(pool, qb).await
}

async fn free_word_documents(pool: &SqlitePool, words: &[String]) -> Result<Vec<Document>> {
    let mut qb = public_base();
    qb.push(" AND (");
    for (i, word) in words.iter().enumerate() {
        if i > 0 {
            qb.push(" OR ");
        }
        let pattern = format!("%{}%", word);
        qb.push("d.title LIKE ")
            .push_bind(pattern.clone())
            .push(" OR d.content LIKE ")
            .push_bind(pattern.clone())
            .push(" OR d.summary LIKE ")
            .push_bind(pattern);
    }
    qb.push(") ORDER BY d.is_featured DESC, d.id LIMIT ")
        .push_bind(FREE_WORD_LIMIT);
    fetch(pool, qb).await
}

async fn featured_documents(pool: &SqlitePool) -> Result<Vec<Document>> {
    let mut qb = public_base();
    qb.push(" AND d.is_featured = 1 ORDER BY d.id LIMIT ")
        .push_bind(FEATURED_LIMIT);
    fetch(pool, qb).await
}

fn dedup_by_id(documents: &mut Vec<Document>) {
    let mut seen = HashSet::new();
    documents.retain(|d| seen.insert(d.id));
}

/// Public documents relevant to a chat message.
pub async fn find_relevant_documents(pool: &SqlitePool, message: &str) -> Result<Vec<CitedDocument>> {
    let mut found: Vec<Document> = Vec::new();

    for topic in matched_topics(message) {
        found.extend(topic_documents(pool, topic).await?);
    }
    // Topics sharing a title fragment return the same rows.
    dedup_by_id(&mut found);

    if found.len() < 2 {
        let words = significant_words(message);
        if !words.is_empty() {
            found.extend(free_word_documents(pool, &words).await?);
            dedup_by_id(&mut found);
        }
    }

    if found.is_empty() {
        found = featured_documents(pool).await?;
    }

    found.truncate(MAX_CITED);

    attach_categories(pool, &mut found).await?;
    Ok(found.iter().map(CitedDocument::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::insert;
    use crate::testing::{sample_document, test_pool};

    fn topic_names(message: &str) -> Vec<&'static str> {
        matched_topics(message).iter().map(|t| t.name).collect()
    }

    #[test]
    fn topics_from_keywords() {
        assert_eq!(
            topic_names("Quels sont mes droits en cas de licenciement ?"),
            vec!["travail"]
        );
        assert_eq!(topic_names("Que dit la Constitution ?"), vec!["constitution"]);
        assert!(topic_names("Comment créer une SARL ?").contains(&"commerce"));
    }

    #[test]
    fn short_keywords_match_inside_words() {
        assert_eq!(topic_names("mon voisin"), vec!["fiscal"]);
        assert_eq!(topic_names("Comment payer la TVA"), vec!["fiscal"]);
        assert!(topic_names("une SA au capital").contains(&"commerce"));
        assert!(topic_names("bonjour").is_empty());
    }

    #[test]
    fn significant_words_drop_stop_words_and_short_ones() {
        assert_eq!(
            significant_words("Pour faire une demande de permis, avec qui ?"),
            vec!["demande".to_string(), "permis".to_string()]
        );
    }

    #[tokio::test]
    async fn topic_documents_are_cited() {
        let (_tmp, pool) = test_pool().await;
        insert(&pool, &sample_document("Code du travail", "code", "active"))
            .await
            .unwrap();
        insert(&pool, &sample_document("Code pénal", "code", "active"))
            .await
            .unwrap();

        let cited = find_relevant_documents(&pool, "Mon employeur refuse mon congé")
            .await
            .unwrap();
        assert_eq!(cited[0].title, "Code du travail");
    }

    #[tokio::test]
    async fn falls_back_to_featured() {
        let (_tmp, pool) = test_pool().await;
        let mut featured = sample_document("Constitution", "constitution", "active");
        featured.is_featured = true;
        insert(&pool, &featured).await.unwrap();

        let cited = find_relevant_documents(&pool, "bonjour").await.unwrap();
        assert_eq!(cited.len(), 1);
        assert_eq!(cited[0].doc_type, "constitution");
    }

    #[tokio::test]
    async fn shared_topic_hits_count_once() {
        let (_tmp, pool) = test_pool().await;
        insert(&pool, &sample_document("Code civil", "code", "active"))
            .await
            .unwrap();
        insert(&pool, &sample_document("Règles coutumier", "loi", "active"))
            .await
            .unwrap();

        // commerce and famille both point at "Code civil"
        let cited = find_relevant_documents(&pool, "société mariage coutumier")
            .await
            .unwrap();
        let titles: Vec<&str> = cited.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Code civil", "Règles coutumier"]);
    }

    #[tokio::test]
    async fn capped_and_deduplicated() {
        let (_tmp, pool) = test_pool().await;
        for i in 0..8 {
            insert(
                &pool,
                &sample_document(&format!("Code du travail {}", i), "code", "active"),
            )
            .await
            .unwrap();
        }
        let cited = find_relevant_documents(&pool, "travail").await.unwrap();
        let ids: HashSet<i64> = cited.iter().map(|c| c.id).collect();
        assert_eq!(ids.len(), cited.len());
        assert!(cited.len() <= MAX_CITED);
    }
}
