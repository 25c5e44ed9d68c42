//! Reference data loaded by `legisci seed`.
//!
//! The base seed creates the category tree and three reference texts; it is
//! idempotent (existing categories and documents, matched by name and by
//! reference number, are left alone). `--demo` adds sample texts with
//! generated articles, upserted by reference number.

use anyhow::Result;
use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::categories::{self, NewCategory};
use crate::documents::{
    find_by_reference, insert, insert_article, insert_section, unique_slug, update, DocumentInput,
    NewArticle, NewSection,
};
use crate::models::{Category, PUBLIC_STATUS};
use crate::text::slugify;

struct RootCategory {
    name: &'static str,
    description: &'static str,
    color: &'static str,
    icon: &'static str,
    children: &'static [&'static str],
}

const ROOT_CATEGORIES: [RootCategory; 5] = [
    RootCategory {
        name: "Droit constitutionnel",
        description: "Constitution et lois fondamentales de la République de Côte d'Ivoire",
        color: "#dc2626",
        icon: "scale",
        children: &["Constitution", "Lois organiques", "Droits de l'homme"],
    },
    RootCategory {
        name: "Droit civil et commercial",
        description: "Code civil, commercial et des affaires",
        color: "#2563eb",
        icon: "briefcase",
        children: &[
            "Code civil",
            "Code de commerce",
            "Droit des sociétés",
            "Droit des contrats",
        ],
    },
    RootCategory {
        name: "Droit pénal",
        description: "Code pénal et procédure pénale",
        color: "#7c2d12",
        icon: "shield",
        children: &["Code pénal", "Procédure pénale", "Exécution des peines"],
    },
    RootCategory {
        name: "Droit du travail",
        description: "Législation du travail et de la sécurité sociale",
        color: "#059669",
        icon: "users",
        children: &["Code du travail", "Sécurité sociale", "Conventions collectives"],
    },
    RootCategory {
        name: "Droit fiscal",
        description: "Code général des impôts et fiscalité",
        color: "#7c3aed",
        icon: "calculator",
        children: &["Impôts directs", "Impôts indirects", "Douanes"],
    },
];

const CATEGORY_COLORS: [&str; 6] = [
    "#dc2626", "#2563eb", "#059669", "#7c3aed", "#ea580c", "#0891b2",
];

const CONSTITUTION_PREAMBLE: &str = "PRÉAMBULE\n\nNous, Peuple de Côte d'Ivoire,\n\n\
Affirmons notre volonté de créer un État de droit et de démocratie pluraliste dans lequel les \
droits fondamentaux de l'homme, les libertés publiques et la dignité de la personne humaine sont \
garantis, protégés et promus ;\n\n\
Réaffirmons notre attachement aux principes et droits fondamentaux tels qu'ils sont définis dans \
la Déclaration universelle des Droits de l'Homme de 1948 et dans la Charte africaine des Droits de \
l'Homme et des Peuples de 1981 ;\n\n\
Exprimons notre engagement à œuvrer pour la paix, la solidarité et l'unité entre les peuples du \
monde entier et ceux d'Afrique en particulier ;\n\n\
Déclarons que la présente Constitution est l'expression de notre volonté souveraine ;\n\n\
Adoptons solennellement la présente Constitution.";

const CONSTITUTION_TITLES: [(&str, &str); 5] = [
    ("Titre I", "TITRE PREMIER : DE L'ÉTAT ET DE LA SOUVERAINETÉ"),
    ("Titre II", "TITRE II : DES DROITS ET DES DEVOIRS DE LA PERSONNE HUMAINE"),
    ("Titre III", "TITRE III : DU PRÉSIDENT DE LA RÉPUBLIQUE"),
    ("Titre IV", "TITRE IV : DU POUVOIR LÉGISLATIF"),
    (
        "Titre V",
        "TITRE V : DES RAPPORTS ENTRE LE POUVOIR EXÉCUTIF ET LE POUVOIR LÉGISLATIF",
    ),
];

const CONSTITUTION_ARTICLES: [(&str, &str); 3] = [
    (
        "1",
        "La Côte d'Ivoire est une République souveraine, indépendante, laïque, démocratique et \
         sociale. Son principe est : Gouvernement du peuple, par le peuple et pour le peuple.",
    ),
    (
        "2",
        "La République de Côte d'Ivoire est une et indivisible, laïque, démocratique et sociale. \
         Elle assure l'égalité devant la loi de tous les citoyens sans distinction d'origine, de \
         race, d'ethnie, de sexe, de religion ou de croyance.",
    ),
    (
        "3",
        "La souveraineté nationale appartient au peuple qui l'exerce par ses représentants élus \
         ou par voie de référendum. Aucune fraction du peuple, ni aucun individu ne peut s'en \
         attribuer l'exercice.",
    ),
];

const LABOUR_CODE_ARTICLES: [(&str, &str, &str); 2] = [
    (
        "1.1",
        "Champ d'application",
        "Les dispositions du présent Code s'appliquent aux relations de travail entre les \
         travailleurs et les employeurs ainsi qu'aux travailleurs et employeurs eux-mêmes, dans \
         tous les secteurs d'activités, qu'ils relèvent du secteur public, parapublic, privé ou du \
         secteur informel.",
    ),
    (
        "2.1",
        "Contrat de travail",
        "Le contrat de travail est une convention par laquelle une personne s'engage à mettre son \
         activité professionnelle sous la direction et l'autorité d'une autre personne, moyennant \
         rémunération.",
    ),
];

struct DemoText {
    title: &'static str,
    doc_type: &'static str,
    reference_number: &'static str,
    summary: &'static str,
    publication_date: &'static str,
    category: &'static str,
    content: &'static str,
    article_titles: [&'static str; 3],
}

const DEMO_TEXTS: [DemoText; 4] = [
    DemoText {
        title: "Décret n° 2023-001 portant application du Code du travail",
        doc_type: "decret",
        reference_number: "Décret n° 2023-001",
        summary: "Décret d'application précisant les modalités d'application du nouveau Code du travail.",
        publication_date: "2023-01-15",
        category: "Droit du travail",
        content: "CHAPITRE I : DISPOSITIONS GÉNÉRALES\n\nLe présent décret fixe les modalités \
            d'application des dispositions du Code du travail relatives aux conditions de travail, \
            à la durée du travail et aux congés payés.\n\nCHAPITRE II : CONDITIONS DE TRAVAIL\n\n\
            Les conditions de travail doivent respecter les normes de sécurité et de santé au \
            travail définies par les textes en vigueur.",
        article_titles: [
            "Champ d'application",
            "Modalités d'exécution",
            "Dispositions transitoires",
        ],
    },
    DemoText {
        title: "Arrêté n° 2023-045 fixant les modalités de création d'entreprise",
        doc_type: "arrete",
        reference_number: "Arrêté n° 2023-045",
        summary: "Arrêté définissant les procédures simplifiées de création d'entreprise.",
        publication_date: "2023-03-10",
        category: "Droit civil et commercial",
        content: "TITRE I : CRÉATION D'ENTREPRISE\n\nArticle 1er : Les formalités de création \
            d'entreprise peuvent être accomplies selon la procédure simplifiée définie par le \
            présent arrêté.\n\nTITRE II : PIÈCES JUSTIFICATIVES\n\nLes pièces requises sont \
            définies selon le type d'entreprise à créer.",
        article_titles: ["Procédures", "Documents requis", "Délais"],
    },
    DemoText {
        title: "Loi n° 2023-123 portant protection de l'environnement",
        doc_type: "loi",
        reference_number: "Loi n° 2023-123",
        summary: "Loi renforçant le cadre juridique de protection de l'environnement.",
        publication_date: "2023-06-20",
        category: "Droit de l'environnement",
        content: "TITRE PREMIER : PRINCIPES GÉNÉRAUX\n\nLa protection de l'environnement est \
            d'intérêt général. Toute personne a le droit de vivre dans un environnement sain.\n\n\
            TITRE II : OBLIGATIONS\n\nToute activité susceptible de porter atteinte à \
            l'environnement doit faire l'objet d'une étude d'impact environnemental.",
        article_titles: ["Principes", "Droits et obligations", "Sanctions"],
    },
    DemoText {
        title: "Ordonnance n° 2023-067 relative à la digitalisation de l'administration",
        doc_type: "ordonnance",
        reference_number: "Ordonnance n° 2023-067",
        summary: "Ordonnance encadrant la transformation digitale des services publics.",
        publication_date: "2023-09-05",
        category: "Droit administratif",
        content: "CHAPITRE I : OBJECTIFS\n\nLa présente ordonnance vise à accélérer la \
            transformation digitale de l'administration publique ivoirienne.\n\nCHAPITRE II : \
            MISE EN ŒUVRE\n\nLes services publics doivent progressivement dématérialiser leurs \
            procédures.",
        article_titles: ["Objectifs", "Mise en application", "Suivi et évaluation"],
    },
];

/// What a seed run did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SeedReport {
    pub categories_created: usize,
    pub documents_created: usize,
    pub documents_updated: usize,
    pub documents_skipped: usize,
}

async fn ensure_category(
    pool: &SqlitePool,
    new: NewCategory,
    report: &mut SeedReport,
) -> Result<Category> {
    if let Some(existing) = categories::find_by_name(pool, &new.name).await? {
        return Ok(existing);
    }
    report.categories_created += 1;
    categories::create(pool, &new).await
}

async fn seed_categories(pool: &SqlitePool, report: &mut SeedReport) -> Result<()> {
    for (position, root) in ROOT_CATEGORIES.iter().enumerate() {
        let parent = ensure_category(
            pool,
            NewCategory {
                name: root.name.to_string(),
                description: Some(root.description.to_string()),
                color: Some(root.color.to_string()),
                icon: Some(root.icon.to_string()),
                sort_order: position as i64,
                is_active: true,
                ..Default::default()
            },
            report,
        )
        .await?;

        for (index, child) in root.children.iter().enumerate() {
            ensure_category(
                pool,
                NewCategory {
                    name: child.to_string(),
                    parent_id: Some(parent.id),
                    sort_order: index as i64,
                    is_active: true,
                    ..Default::default()
                },
                report,
            )
            .await?;
        }
    }
    Ok(())
}

async fn category_id(pool: &SqlitePool, name: &str) -> Result<Option<i64>> {
    Ok(categories::find_by_name(pool, name).await?.map(|c| c.id))
}

#[allow(clippy::too_many_arguments)]
fn reference_text(
    title: &str,
    summary: &str,
    content: &str,
    doc_type: &str,
    reference: &str,
    date: &str,
    journal: &str,
    category_id: Option<i64>,
    featured: bool,
) -> DocumentInput {
    DocumentInput {
        title: title.to_string(),
        slug: slugify(title),
        summary: Some(summary.to_string()),
        content: content.to_string(),
        doc_type: doc_type.to_string(),
        reference_number: Some(reference.to_string()),
        publication_date: Some(date.to_string()),
        effective_date: Some(date.to_string()),
        journal_officiel: Some(journal.to_string()),
        status: PUBLIC_STATUS.to_string(),
        category_id,
        is_featured: featured,
        ..Default::default()
    }
}

/// Inserts `input` unless its reference number is already present.
async fn insert_reference_text(
    pool: &SqlitePool,
    mut input: DocumentInput,
    report: &mut SeedReport,
) -> Result<Option<i64>> {
    if let Some(reference) = input.reference_number.as_deref() {
        if find_by_reference(pool, reference).await?.is_some() {
            report.documents_skipped += 1;
            return Ok(None);
        }
    }
    input.slug = unique_slug(pool, &input.slug, None).await?;
    let document = insert(pool, &input).await?;
    report.documents_created += 1;
    Ok(Some(document.id))
}

async fn seed_constitution(pool: &SqlitePool, report: &mut SeedReport) -> Result<()> {
    let input = reference_text(
        "Constitution de la République de Côte d'Ivoire",
        "Loi fondamentale de la République de Côte d'Ivoire adoptée le 8 novembre 2016",
        CONSTITUTION_PREAMBLE,
        "constitution",
        "Constitution 2016",
        "2016-11-08",
        "JO n° 47 du 8 novembre 2016",
        category_id(pool, "Constitution").await?,
        true,
    );
    let Some(document_id) = insert_reference_text(pool, input, report).await? else {
        return Ok(());
    };

    for (index, (number, title)) in CONSTITUTION_TITLES.iter().enumerate() {
        insert_section(
            pool,
            document_id,
            &NewSection {
                title: title.to_string(),
                number: Some(number.to_string()),
                sort_order: index as i64,
                ..Default::default()
            },
        )
        .await?;
    }
    for (index, (number, content)) in CONSTITUTION_ARTICLES.iter().enumerate() {
        insert_article(
            pool,
            document_id,
            &NewArticle {
                number: number.to_string(),
                content: content.to_string(),
                sort_order: index as i64,
                ..Default::default()
            },
        )
        .await?;
    }
    Ok(())
}

async fn seed_labour_code(pool: &SqlitePool, report: &mut SeedReport) -> Result<()> {
    let input = reference_text(
        "Loi n° 2015-532 du 20 juillet 2015 portant Code du travail",
        "Code du travail de la République de Côte d'Ivoire",
        "Le présent Code régit les rapports de travail entre employeurs et travailleurs...",
        "code",
        "Loi n° 2015-532",
        "2015-07-20",
        "JO n° 29 du 20 juillet 2015",
        category_id(pool, "Code du travail").await?,
        true,
    );
    let Some(document_id) = insert_reference_text(pool, input, report).await? else {
        return Ok(());
    };

    for (index, (number, title, content)) in LABOUR_CODE_ARTICLES.iter().enumerate() {
        insert_article(
            pool,
            document_id,
            &NewArticle {
                number: number.to_string(),
                title: Some(title.to_string()),
                content: content.to_string(),
                sort_order: index as i64,
                ..Default::default()
            },
        )
        .await?;
    }
    Ok(())
}

async fn seed_penal_code(pool: &SqlitePool, report: &mut SeedReport) -> Result<()> {
    let input = reference_text(
        "Loi n° 81-640 du 31 juillet 1981 instituant le Code pénal",
        "Code pénal de la République de Côte d'Ivoire",
        "Le présent Code définit les infractions et fixe les peines applicables aux personnes \
         physiques et morales...",
        "code",
        "Loi n° 81-640",
        "1981-07-31",
        "JO du 31 juillet 1981",
        category_id(pool, "Code pénal").await?,
        false,
    );
    insert_reference_text(pool, input, report).await?;
    Ok(())
}

/// Category tree plus the Constitution, the Labour Code and the Penal Code.
pub async fn seed_reference_data(pool: &SqlitePool) -> Result<SeedReport> {
    let mut report = SeedReport::default();
    seed_categories(pool, &mut report).await?;
    seed_constitution(pool, &mut report).await?;
    seed_labour_code(pool, &mut report).await?;
    seed_penal_code(pool, &mut report).await?;
    tracing::info!(
        categories = report.categories_created,
        documents = report.documents_created,
        skipped = report.documents_skipped,
        "reference data seeded"
    );
    Ok(report)
}

fn pick_color(name: &str) -> &'static str {
    let sum: usize = name.bytes().map(usize::from).sum();
    CATEGORY_COLORS[sum % CATEGORY_COLORS.len()]
}

fn journal_reference(position: usize, date: &str) -> String {
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(day) => format!("JO n° {} du {}", position * 7 + 3, day.format("%d/%m/%Y")),
        Err(_) => format!("JO n° {}", position * 7 + 3),
    }
}

async fn replace_demo_articles(
    pool: &SqlitePool,
    document_id: i64,
    demo: &DemoText,
    count: usize,
) -> Result<()> {
    sqlx::query("DELETE FROM legal_articles WHERE document_id = ?")
        .bind(document_id)
        .execute(pool)
        .await?;

    for i in 1..=count {
        insert_article(
            pool,
            document_id,
            &NewArticle {
                number: i.to_string(),
                title: Some(demo.article_titles[(i - 1) % demo.article_titles.len()].to_string()),
                content: format!(
                    "Contenu de l'article {} du {}. Cette disposition précise les modalités \
                     d'application et les conditions spécifiques requises pour la mise en œuvre \
                     des mesures prévues.",
                    i, demo.doc_type
                ),
                sort_order: i as i64,
                ..Default::default()
            },
        )
        .await?;
    }
    Ok(())
}

/// Demo texts with generated articles. Existing ones (same reference
/// number) are skipped unless `force`, which overwrites them.
pub async fn seed_demo(pool: &SqlitePool, limit: usize, force: bool) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for (position, demo) in DEMO_TEXTS.iter().take(limit).enumerate() {
        let category = ensure_category(
            pool,
            NewCategory {
                name: demo.category.to_string(),
                description: Some(format!("Catégorie {}", demo.category)),
                color: Some(pick_color(demo.category).to_string()),
                icon: Some("scale".to_string()),
                is_active: true,
                ..Default::default()
            },
            &mut report,
        )
        .await?;

        let existing = find_by_reference(pool, demo.reference_number).await?;
        if existing.is_some() && !force {
            report.documents_skipped += 1;
            continue;
        }

        let mut input = DocumentInput {
            title: demo.title.to_string(),
            slug: slugify(demo.title),
            summary: Some(demo.summary.to_string()),
            content: demo.content.to_string(),
            doc_type: demo.doc_type.to_string(),
            reference_number: Some(demo.reference_number.to_string()),
            publication_date: Some(demo.publication_date.to_string()),
            effective_date: Some(demo.publication_date.to_string()),
            journal_officiel: Some(journal_reference(position, demo.publication_date)),
            status: PUBLIC_STATUS.to_string(),
            category_id: Some(category.id),
            is_featured: position % 2 == 0,
            ..Default::default()
        };

        let document_id = match existing {
            Some(document) => {
                input.slug = unique_slug(pool, &input.slug, Some(document.id)).await?;
                input.views_count = document.views_count;
                update(pool, document.id, &input).await?;
                report.documents_updated += 1;
                document.id
            }
            None => {
                input.slug = unique_slug(pool, &input.slug, None).await?;
                let document = insert(pool, &input).await?;
                report.documents_created += 1;
                document.id
            }
        };
        replace_demo_articles(pool, document_id, demo, 3 + position).await?;
    }

    tracing::info!(
        created = report.documents_created,
        updated = report.documents_updated,
        skipped = report.documents_skipped,
        "demo texts seeded"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{load_relations, show_by_slug};
    use crate::testing::test_pool;

    #[tokio::test]
    async fn reference_seed_is_idempotent() {
        let (_tmp, pool) = test_pool().await;
        let first = seed_reference_data(&pool).await.unwrap();
        assert_eq!(first.categories_created, 21);
        assert_eq!(first.documents_created, 3);

        let second = seed_reference_data(&pool).await.unwrap();
        assert_eq!(second.categories_created, 0);
        assert_eq!(second.documents_created, 0);
        assert_eq!(second.documents_skipped, 3);

        let roots = categories::list_roots(&pool).await.unwrap();
        assert_eq!(roots.len(), 5);
    }

    #[tokio::test]
    async fn constitution_has_sections_and_articles() {
        let (_tmp, pool) = test_pool().await;
        seed_reference_data(&pool).await.unwrap();

        let mut constitution = find_by_reference(&pool, "Constitution 2016")
            .await
            .unwrap()
            .unwrap();
        load_relations(&pool, &mut constitution).await.unwrap();
        assert_eq!(constitution.sections.as_ref().unwrap().len(), 5);
        assert_eq!(constitution.articles.as_ref().unwrap().len(), 3);
        assert_eq!(constitution.category.as_ref().unwrap().name, "Constitution");
        assert!(constitution.is_featured);
        assert!(show_by_slug(&pool, "constitution-de-la-republique-de-cote-divoire")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn demo_upserts_by_reference() {
        let (_tmp, pool) = test_pool().await;
        let report = seed_demo(&pool, 2, false).await.unwrap();
        assert_eq!(report.documents_created, 2);
        assert!(categories::find_by_name(&pool, "Droit du travail")
            .await
            .unwrap()
            .is_some());

        let again = seed_demo(&pool, 10, false).await.unwrap();
        assert_eq!((again.documents_created, again.documents_skipped), (2, 2));

        let forced = seed_demo(&pool, 10, true).await.unwrap();
        assert_eq!(forced.documents_updated, 4);

        let mut decree = find_by_reference(&pool, "Décret n° 2023-001").await.unwrap().unwrap();
        load_relations(&pool, &mut decree).await.unwrap();
        assert_eq!(decree.articles.as_ref().unwrap().len(), 3);
        assert_eq!(
            decree.articles.as_ref().unwrap()[0].title.as_deref(),
            Some("Champ d'application")
        );
    }
}
